//! Immutable definition tables, loaded once at game start.
//!
//! Everything here is read-only for the duration of a game. Definitions are
//! keyed by name; the database assigns dense ids where the simulation needs
//! them (movement classes) and cross-validates references up front so a
//! broken mod refuses to start instead of failing mid-game.

use serde::{Deserialize, Serialize};

use crate::collections::Grid;
use crate::fixed_math::{SimAngle, SimScalar, SimVector};
use rustc_hash::FxHashMap;

pub use database::{GameDatabase, LoadError};

mod database;

/// Damage table key that applies when a unit type has no specific entry.
pub const DEFAULT_DAMAGE_KEY: &str = "DEFAULT";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub unit_name: String,
    /// Model (and script) name this unit renders and animates with.
    pub object_name: String,
    /// Movement class name; `None` for buildings, which use their own
    /// footprint and slope fields below.
    pub movement_class: Option<String>,

    /// Angle units per tick.
    pub turn_rate: SimScalar,
    /// World units per tick.
    pub max_velocity: SimScalar,
    pub acceleration: SimScalar,
    pub brake_rate: SimScalar,

    pub footprint_x: u32,
    pub footprint_z: u32,
    pub max_slope: u32,
    pub max_water_slope: u32,
    pub min_water_depth: u32,
    pub max_water_depth: u32,

    pub can_attack: bool,
    pub can_move: bool,
    pub can_guard: bool,
    pub commander: bool,

    pub max_damage: u32,

    /// True for mobile units, false for buildings.
    pub bm_code: bool,
    pub floater: bool,
    pub can_hover: bool,

    #[serde(default)]
    pub weapons: Vec<String>,

    #[serde(default)]
    pub explode_as: Option<String>,

    pub builder: bool,
    pub build_time: u32,
    pub build_cost_energy: SimScalar,
    pub build_cost_metal: SimScalar,
    pub worker_time: u32,
    pub build_distance: u32,

    pub on_offable: bool,
    pub activate_when_built: bool,

    /// Per-tick resource flows while active.
    pub energy_make: SimScalar,
    pub metal_make: SimScalar,
    pub energy_use: SimScalar,
    pub metal_use: SimScalar,

    pub energy_storage: SimScalar,
    pub metal_storage: SimScalar,

    #[serde(default)]
    pub yard_map: Option<String>,

    #[serde(default)]
    pub corpse: Option<String>,
}

impl UnitDefinition {
    pub fn is_mobile(&self) -> bool {
        self.bm_code
    }

    /// Movement parameters for units that do not name a shared movement
    /// class.
    pub fn ad_hoc_movement_class(&self) -> MovementClassDefinition {
        MovementClassDefinition {
            name: self.unit_name.clone(),
            footprint_x: self.footprint_x,
            footprint_z: self.footprint_z,
            min_water_depth: self.min_water_depth,
            max_water_depth: self.max_water_depth,
            max_slope: self.max_slope,
            max_water_slope: self.max_water_slope,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectilePhysicsType {
    /// Travels flat at constant velocity.
    LineOfSight,
    /// Arcs under gravity; aiming solves the launch pitch.
    Ballistic,
}

/// How the renderer draws a projectile. Carried through the simulation
/// untouched; media lookups happen on the render side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ProjectileRenderType {
    Laser {
        /// Trail length in ticks of travel.
        duration: SimScalar,
    },
    Model {
        object_name: String,
    },
    Sprite {
        anim_name: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeaponDefinition {
    pub physics_type: ProjectilePhysicsType,

    pub max_range: SimScalar,
    /// Seconds between bursts.
    pub reload_time: SimScalar,

    pub start_smoke: bool,
    pub end_smoke: bool,
    /// Ticks between smoke puffs while the projectile flies.
    #[serde(default)]
    pub smoke_trail: Option<u32>,

    /// Shots per burst.
    pub burst: u32,
    /// Seconds between shots within a burst.
    pub burst_interval: SimScalar,
    /// Maximum random deviation applied to each burst shot.
    pub spray_angle: SimAngle,

    pub tolerance: SimAngle,
    pub pitch_tolerance: SimAngle,

    pub render_type: ProjectileRenderType,

    /// World units per tick.
    pub velocity: SimScalar,

    /// Fires only on an explicit attack order, never auto-acquires.
    pub command_fire: bool,

    pub damage: FxHashMap<String, u32>,
    pub damage_radius: SimScalar,

    /// Projectile lifetime in ticks.
    #[serde(default)]
    pub weapon_timer: Option<u32>,
    /// Random lifetime variation in ticks.
    #[serde(default)]
    pub random_decay: Option<u32>,

    pub sound_trigger: bool,
    /// Skip terrain detonation and keep flying.
    pub ground_bounce: bool,
}

impl WeaponDefinition {
    pub fn reload_ticks(&self) -> u32 {
        seconds_to_ticks(self.reload_time)
    }

    pub fn burst_interval_ticks(&self) -> u32 {
        seconds_to_ticks(self.burst_interval)
    }
}

fn seconds_to_ticks(seconds: SimScalar) -> u32 {
    let ticks = seconds * SimScalar::from_num(crate::ids::TICKS_PER_SECOND);
    ticks.ceil().to_num::<i64>().max(1) as u32
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MovementClassDefinition {
    pub name: String,
    pub footprint_x: u32,
    pub footprint_z: u32,
    pub min_water_depth: u32,
    pub max_water_depth: u32,
    pub max_slope: u32,
    pub max_water_slope: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub footprint_x: u32,
    pub footprint_z: u32,
    pub height: SimScalar,
    pub blocking: bool,
    pub reclaimable: bool,
    pub flammable: bool,
    pub metal: SimScalar,
    pub energy: SimScalar,
    /// Hit points to chew through when reclaiming.
    pub damage: u32,
    /// Render handle; resolved outside the simulation.
    pub object_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitPieceDefinition {
    pub name: String,
    pub origin: SimVector,
    pub parent: Option<String>,
}

/// A unit model: the articulated piece tree, flattened to an array with
/// parents as indices so ancestry walks always terminate.
#[derive(Clone, Debug)]
pub struct UnitModelDefinition {
    pub height: SimScalar,
    pub pieces: Vec<UnitPieceDefinition>,
    pub parent_indices: Vec<Option<usize>>,
    piece_indices_by_name: FxHashMap<String, usize>,
}

impl UnitModelDefinition {
    pub fn new(
        model_name: &str,
        height: SimScalar,
        pieces: Vec<UnitPieceDefinition>,
    ) -> Result<Self, LoadError> {
        let mut piece_indices_by_name = FxHashMap::default();
        for (i, piece) in pieces.iter().enumerate() {
            piece_indices_by_name.insert(piece.name.to_uppercase(), i);
        }

        let mut parent_indices = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            match &piece.parent {
                None => parent_indices.push(None),
                Some(parent) => {
                    let index = piece_indices_by_name
                        .get(&parent.to_uppercase())
                        .copied()
                        .ok_or_else(|| LoadError::UnknownModelParent {
                            model: model_name.to_string(),
                            piece: piece.name.clone(),
                            parent: parent.clone(),
                        })?;
                    parent_indices.push(Some(index));
                }
            }
        }

        let model = Self {
            height,
            pieces,
            parent_indices,
            piece_indices_by_name,
        };
        model.check_for_cycles(model_name)?;
        Ok(model)
    }

    fn check_for_cycles(&self, model_name: &str) -> Result<(), LoadError> {
        for start in 0..self.pieces.len() {
            let mut cursor = self.parent_indices[start];
            let mut steps = 0;
            while let Some(i) = cursor {
                steps += 1;
                if steps > self.pieces.len() {
                    return Err(LoadError::ModelParentCycle {
                        model: model_name.to_string(),
                        piece: self.pieces[start].name.clone(),
                    });
                }
                cursor = self.parent_indices[i];
            }
        }
        Ok(())
    }

    pub fn piece_index(&self, name: &str) -> Option<usize> {
        self.piece_indices_by_name.get(&name.to_uppercase()).copied()
    }
}

/// One cell of a building's yard map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum YardMapCell {
    Blocked,
    Passable,
    /// Passable while the yard is open (a factory bay).
    PassableWhenOpen,
    /// Passable while the yard is closed.
    PassableWhenClosed,
}

impl YardMapCell {
    pub fn is_passable(self, yard_open: bool) -> bool {
        match self {
            YardMapCell::Blocked => false,
            YardMapCell::Passable => true,
            YardMapCell::PassableWhenOpen => yard_open,
            YardMapCell::PassableWhenClosed => !yard_open,
        }
    }
}

/// Parses a yard map string into a footprint-sized grid. Cells beyond the
/// string are blocked, matching the behaviour of short strings in the
/// original data files.
pub fn parse_yard_map(
    unit_name: &str,
    text: &str,
    footprint_x: u32,
    footprint_z: u32,
) -> Result<Grid<YardMapCell>, LoadError> {
    let mut cells = Vec::with_capacity((footprint_x * footprint_z) as usize);
    for c in text.chars() {
        let cell = match c.to_ascii_lowercase() {
            'o' => YardMapCell::Blocked,
            'f' => YardMapCell::Passable,
            'y' => YardMapCell::PassableWhenOpen,
            'c' => YardMapCell::PassableWhenClosed,
            c if c.is_whitespace() => continue,
            other => {
                return Err(LoadError::BadYardMap {
                    unit: unit_name.to_string(),
                    reason: format!("unknown cell character {other:?}"),
                })
            }
        };
        cells.push(cell);
    }

    if cells.len() > (footprint_x * footprint_z) as usize {
        return Err(LoadError::BadYardMap {
            unit: unit_name.to_string(),
            reason: format!(
                "{} cells for a {}x{} footprint",
                cells.len(),
                footprint_x,
                footprint_z
            ),
        });
    }

    let mut iter = cells.into_iter();
    Ok(Grid::from_fn(
        footprint_x as usize,
        footprint_z as usize,
        |_| iter.next().unwrap_or(YardMapCell::Blocked),
    ))
}
