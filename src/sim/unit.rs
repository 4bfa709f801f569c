//! Unit state: the mutable record behind every unit on the map.

use std::collections::VecDeque;

use smallvec::SmallVec;

use crate::cob::ScriptEnvironment;
use crate::collections::DiscreteRect;
use crate::commands::{FireOrders, ReclaimTarget, UnitOrder};
use crate::fixed_math::{SimAngle, SimScalar, SimVector};
use crate::ids::{GameTime, PathTaskId, PlayerId, UnitId};

use super::mesh::UnitMeshState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifeState {
    Alive,
    Dead,
}

/// Where a move is headed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationGoal {
    Point(SimVector),
    /// Stop adjacent to this footprint (walking up to a build site).
    NearRect(DiscreteRect),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathFollowState {
    pub waypoints: Vec<SimVector>,
    pub current: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovingState {
    pub destination: NavigationGoal,
    /// Outstanding path request; a result whose task id no longer matches
    /// is dropped.
    pub path_requested: Option<PathTaskId>,
    pub path: Option<PathFollowState>,
}

impl MovingState {
    pub fn new(destination: NavigationGoal) -> Self {
        Self {
            destination,
            path_requested: None,
            path: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitCreationStatus {
    Pending,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatingUnitState {
    pub unit_type: String,
    pub position: SimVector,
    pub status: UnitCreationStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitBehavior {
    Idle,
    Moving(MovingState),
    /// Transferring build progress into an in-progress unit.
    Building(UnitId),
    /// Waiting for space to place a new unit's skeleton.
    CreatingUnit(CreatingUnitState),
    Guarding(UnitId),
    Reclaiming(ReclaimTarget),
}

// ---------------------------------------------------------------------------
// Weapons
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeaponAttackTarget {
    Unit(UnitId),
    Ground(SimVector),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AimInfo {
    /// The aim script thread; the weapon is on target when it completes and
    /// the last requested angles are still within tolerance.
    pub thread: u32,
    pub last_heading: SimAngle,
    pub last_pitch: SimAngle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FireInfo {
    pub heading: SimAngle,
    pub pitch: SimAngle,
    pub target_position: SimVector,
    /// Model piece the projectile leaves from, resolved by the script's
    /// query entry point.
    pub firing_piece: Option<usize>,
    /// Shots fired so far in the current burst.
    pub bursts_fired: u32,
    /// When the next shot of the burst can be fired.
    pub ready_time: GameTime,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttackInfo {
    /// Target chosen, aim not yet requested.
    Targeting,
    Aiming(AimInfo),
    Firing(FireInfo),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttackingState {
    pub target: WeaponAttackTarget,
    pub info: AttackInfo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WeaponState {
    Idle,
    Attacking(AttackingState),
}

#[derive(Clone, Debug)]
pub struct UnitWeapon {
    pub weapon_type: String,
    /// When the weapon next becomes ready to start a burst.
    pub ready_time: GameTime,
    /// Offset from aim point to firing point, compensation for ballistics.
    pub ballistic_z_offset: SimScalar,
    pub state: WeaponState,
}

impl UnitWeapon {
    pub fn new(weapon_type: &str) -> Self {
        Self {
            weapon_type: weapon_type.to_string(),
            ready_time: GameTime(0),
            ballistic_z_offset: SimScalar::ZERO,
            state: WeaponState::Idle,
        }
    }
}

// ---------------------------------------------------------------------------
// The unit record
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct UnitState {
    /// Lookup key into the immutable unit definition table.
    pub unit_type: String,
    pub owner: PlayerId,

    pub position: SimVector,
    pub previous_position: SimVector,
    pub rotation: SimAngle,
    pub previous_rotation: SimAngle,

    /// Angle units per tick.
    pub turn_rate: SimScalar,
    /// World units per tick.
    pub current_speed: SimScalar,
    pub target_angle: SimAngle,
    pub target_speed: SimScalar,

    pub hit_points: u32,
    pub max_damage: u32,
    pub life_state: LifeState,

    pub behaviour_state: UnitBehavior,
    pub order_queue: VecDeque<UnitOrder>,
    /// Factory production: contiguous runs of (unit type, count).
    pub build_queue: VecDeque<(String, u32)>,

    pub in_build_stance: bool,
    pub yard_open: bool,
    pub in_collision: bool,
    pub activated: bool,
    pub is_sufficiently_powered: bool,

    pub fire_orders: FireOrders,
    /// Set when damaged; return-fire targets this.
    pub last_attacker: Option<UnitId>,

    /// Construction progress, 0 to 1. A unit below 1 is a skeleton: no
    /// scripts beyond Create, no weapons, no economy.
    pub build_time_completed: SimScalar,

    // Per-tick economy flows, recomputed by the resource phase.
    pub metal_make: SimScalar,
    pub energy_make: SimScalar,
    pub metal_use: SimScalar,
    pub energy_use: SimScalar,
    pub previous_metal_use: SimScalar,
    pub previous_energy_use: SimScalar,

    /// Build spending accumulated this tick by the behaviour phase; folded
    /// into `metal_use`/`energy_use` by the resource phase.
    pub build_metal_this_tick: SimScalar,
    pub build_energy_this_tick: SimScalar,

    /// One entry per model piece, same order as the model's piece list.
    pub pieces: Vec<UnitMeshState>,
    pub cob_env: ScriptEnvironment,

    /// Weapon slots; the first three map onto the Primary/Secondary/Tertiary
    /// script entry points.
    pub weapons: SmallVec<[Option<UnitWeapon>; 3]>,
}

impl UnitState {
    pub fn is_alive(&self) -> bool {
        self.life_state == LifeState::Alive
    }

    pub fn is_fully_built(&self) -> bool {
        self.build_time_completed >= SimScalar::ONE
    }

    pub fn damage(&mut self, amount: u32, attacker: Option<UnitId>) {
        if amount == 0 || !self.is_alive() {
            return;
        }
        if let Some(attacker) = attacker {
            self.last_attacker = Some(attacker);
        }
        if amount >= self.hit_points {
            self.hit_points = 0;
            self.life_state = LifeState::Dead;
        } else {
            self.hit_points -= amount;
        }
    }

    /// Moving-state accessor for the pathfinding plumbing.
    pub fn moving_state_mut(&mut self) -> Option<&mut MovingState> {
        match &mut self.behaviour_state {
            UnitBehavior::Moving(ms) => Some(ms),
            _ => None,
        }
    }

    pub fn clear_movement(&mut self) {
        self.target_speed = SimScalar::ZERO;
        self.in_collision = false;
    }
}
