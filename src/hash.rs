//! The per-tick state fingerprint used for desync detection.
//!
//! The hash is a wrapping 32-bit sum: containers hash to the sum of their
//! elements, tagged unions add their variant index, scalars hash to their
//! raw bit pattern. Cheap, order-independent inside containers, and good
//! enough to catch real divergence — not a cryptographic digest. Dense maps
//! are iterated by id, so the one order-sensitive ingredient (variant
//! indices) is identical on every peer.

use serde::{Deserialize, Serialize};

use crate::collections::{DiscreteRect, VecMap};
use crate::commands::{FireOrders, ReclaimTarget};
use crate::fixed_math::{SimAngle, SimScalar, SimVector};
use crate::ids::{DenseId, GameTime, PathTaskId, PlayerId, UnitId};
use crate::sim::{
    GamePlayerInfo, GameSimulation, LifeState, MovingState, NavigationGoal, PlayerStatus,
    PlayerType, Projectile, UnitBehavior, UnitState,
};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GameHash(pub u32);

impl std::ops::Add for GameHash {
    type Output = GameHash;
    fn add(self, rhs: GameHash) -> GameHash {
        GameHash(self.0.wrapping_add(rhs.0))
    }
}

impl std::ops::AddAssign for GameHash {
    fn add_assign(&mut self, rhs: GameHash) {
        *self = *self + rhs;
    }
}

pub trait ComputeHash {
    fn compute_hash(&self) -> GameHash;
}

macro_rules! combine_hashes {
    ($($item:expr),+ $(,)?) => {{
        let mut sum = GameHash(0);
        $(sum += $item.compute_hash();)+
        sum
    }};
}

impl ComputeHash for GameHash {
    fn compute_hash(&self) -> GameHash {
        *self
    }
}

impl ComputeHash for bool {
    fn compute_hash(&self) -> GameHash {
        GameHash(u32::from(*self))
    }
}

impl ComputeHash for u32 {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self)
    }
}

impl ComputeHash for i32 {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for u16 {
    fn compute_hash(&self) -> GameHash {
        GameHash(u32::from(*self))
    }
}

impl ComputeHash for u8 {
    fn compute_hash(&self) -> GameHash {
        GameHash(u32::from(*self))
    }
}

impl ComputeHash for usize {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for SimScalar {
    fn compute_hash(&self) -> GameHash {
        GameHash(self.to_bits() as u32)
    }
}

impl ComputeHash for SimAngle {
    fn compute_hash(&self) -> GameHash {
        self.0.compute_hash()
    }
}

impl ComputeHash for str {
    fn compute_hash(&self) -> GameHash {
        GameHash(
            self.bytes()
                .fold(0u32, |sum, b| sum.wrapping_add(u32::from(b))),
        )
    }
}

impl ComputeHash for String {
    fn compute_hash(&self) -> GameHash {
        self.as_str().compute_hash()
    }
}

impl<T: ComputeHash> ComputeHash for Option<T> {
    fn compute_hash(&self) -> GameHash {
        match self {
            Some(v) => v.compute_hash(),
            None => GameHash(0),
        }
    }
}

impl<T: ComputeHash> ComputeHash for [T] {
    fn compute_hash(&self) -> GameHash {
        self.iter()
            .fold(GameHash(0), |sum, item| sum + item.compute_hash())
    }
}

impl<T: ComputeHash> ComputeHash for Vec<T> {
    fn compute_hash(&self) -> GameHash {
        self.as_slice().compute_hash()
    }
}

impl<A: ComputeHash, B: ComputeHash> ComputeHash for (A, B) {
    fn compute_hash(&self) -> GameHash {
        self.0.compute_hash() + self.1.compute_hash()
    }
}

impl<K: DenseId, V: ComputeHash> ComputeHash for VecMap<K, V> {
    fn compute_hash(&self) -> GameHash {
        self.values()
            .fold(GameHash(0), |sum, item| sum + item.compute_hash())
    }
}

impl ComputeHash for SimVector {
    fn compute_hash(&self) -> GameHash {
        combine_hashes!(self.x, self.y, self.z)
    }
}

impl ComputeHash for GameTime {
    fn compute_hash(&self) -> GameHash {
        GameHash(self.0)
    }
}

macro_rules! impl_hash_for_id {
    ($($id:ty),+) => {
        $(impl ComputeHash for $id {
            fn compute_hash(&self) -> GameHash {
                GameHash(self.0)
            }
        })+
    };
}

impl_hash_for_id!(UnitId, PlayerId, PathTaskId, crate::ids::FeatureId);

impl ComputeHash for DiscreteRect {
    fn compute_hash(&self) -> GameHash {
        combine_hashes!(self.x as u32, self.y as u32, self.width, self.height)
    }
}

impl ComputeHash for FireOrders {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for LifeState {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for PlayerType {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for PlayerStatus {
    fn compute_hash(&self) -> GameHash {
        GameHash(*self as u32)
    }
}

impl ComputeHash for NavigationGoal {
    fn compute_hash(&self) -> GameHash {
        match self {
            NavigationGoal::Point(p) => GameHash(0) + p.compute_hash(),
            NavigationGoal::NearRect(r) => GameHash(1) + r.compute_hash(),
        }
    }
}

impl ComputeHash for MovingState {
    fn compute_hash(&self) -> GameHash {
        combine_hashes!(self.destination, self.path_requested)
    }
}

impl ComputeHash for ReclaimTarget {
    fn compute_hash(&self) -> GameHash {
        match self {
            ReclaimTarget::Unit(u) => GameHash(0) + u.compute_hash(),
            ReclaimTarget::Feature(f) => GameHash(1) + f.compute_hash(),
        }
    }
}

impl ComputeHash for UnitBehavior {
    fn compute_hash(&self) -> GameHash {
        match self {
            UnitBehavior::Idle => GameHash(0),
            UnitBehavior::Moving(ms) => GameHash(1) + ms.compute_hash(),
            UnitBehavior::Building(target) => GameHash(2) + target.compute_hash(),
            UnitBehavior::CreatingUnit(s) => {
                GameHash(3) + combine_hashes!(s.unit_type, s.position)
            }
            UnitBehavior::Guarding(target) => GameHash(4) + target.compute_hash(),
            UnitBehavior::Reclaiming(target) => GameHash(5) + target.compute_hash(),
        }
    }
}

impl ComputeHash for UnitState {
    fn compute_hash(&self) -> GameHash {
        combine_hashes!(
            self.unit_type,
            self.position,
            self.owner,
            self.rotation,
            self.turn_rate,
            self.current_speed,
            self.target_angle,
            self.target_speed,
            self.hit_points,
            self.life_state,
            self.behaviour_state,
            self.in_build_stance,
            self.yard_open,
            self.in_collision,
            self.fire_orders,
            self.build_time_completed,
            self.activated,
            self.is_sufficiently_powered,
            self.energy_make,
            self.metal_make,
            self.previous_energy_use,
            self.previous_metal_use,
            self.energy_use,
            self.metal_use,
        )
    }
}

impl ComputeHash for Projectile {
    fn compute_hash(&self) -> GameHash {
        let mut hash = combine_hashes!(
            self.owner,
            self.position,
            self.origin,
            self.velocity,
            self.damage_radius,
        );
        for damage in self.damage.values() {
            hash += damage.compute_hash();
        }
        hash
    }
}

impl ComputeHash for GamePlayerInfo {
    fn compute_hash(&self) -> GameHash {
        combine_hashes!(
            self.player_type,
            self.color,
            self.status,
            self.side,
            self.metal,
            self.max_metal,
            self.energy,
            self.max_energy,
            self.metal_stalled,
            self.energy_stalled,
            self.desired_metal_consumption,
            self.desired_energy_consumption,
            self.previous_desired_metal_consumption,
            self.previous_desired_energy_consumption,
            self.actual_metal_consumption,
            self.actual_energy_consumption,
            self.metal_production,
            self.energy_production,
        )
    }
}

/// The per-tick fingerprint submitted to the lockstep service.
pub fn compute_hash_of(simulation: &GameSimulation) -> GameHash {
    let players = simulation
        .players
        .iter()
        .fold(GameHash(0), |sum, p| sum + p.compute_hash());
    combine_hashes!(
        simulation.game_time,
        players,
        simulation.units,
        simulation.projectiles,
    )
}
