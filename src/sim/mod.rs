//! The simulation: world state and the fixed tick that advances it.
//!
//! The simulation exclusively owns all mutable game state. Rendering reads
//! it between ticks through shared references; the network thread never
//! touches it (commands arrive through the lockstep service). Everything a
//! tick needs besides the state itself travels in [`SimulationContext`] —
//! no ambient globals.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::collections::{DiscreteRect, Grid, Point, VecMap};
use crate::data::GameDatabase;
use crate::fixed_math::{SimAngle, SimScalar, SimVector};
use crate::ids::{DenseId, FeatureId, GameTime, MovementClassId, PlayerId, ProjectileId, UnitId};
use crate::pathfinding::{PathFindingService, PathWorldView};
use crate::terrain::{compute_walkable_grid, MapTerrain, WalkabilityStore, CELL_WORLD_SIZE};

pub use events::SimEvent;
pub use feature::MapFeature;
pub use mesh::{
    piece_local_position, piece_transform, pieces_for_model, MoveOperation, SpinOperation,
    StopSpinOperation, TurnOperation, TurnOperationKind, UnitMeshState,
};
pub use player::{GamePlayerInfo, PlayerStatus, PlayerType};
pub use projectile::{gravity, Projectile};
pub use tick::tick;
pub use unit::{
    AimInfo, AttackInfo, AttackingState, CreatingUnitState, FireInfo, LifeState, MovingState,
    NavigationGoal, PathFollowState, UnitBehavior, UnitCreationStatus, UnitState, UnitWeapon,
    WeaponAttackTarget, WeaponState,
};

mod behaviour;
mod cob_glue;
mod economy;
mod events;
mod feature;
mod mesh;
mod player;
mod projectile;
mod tick;
mod unit;
mod weapons;

pub const MAX_PLAYERS: usize = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OccupiedType {
    #[default]
    None,
    Unit(UnitId),
    Feature(FeatureId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BuildingOccupiedCell {
    pub unit: UnitId,
    pub passable: bool,
}

/// One cell of the occupation grid. Mobile units and features claim the
/// `occupied` slot; buildings claim the `building` slot with per-cell
/// yard-map passability, so a unit can stand inside an open factory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OccupiedCell {
    pub occupied: OccupiedType,
    pub building: Option<BuildingOccupiedCell>,
}

/// The services a tick runs against: immutable content, the path queue and
/// the outgoing event sink.
pub struct SimulationContext<'a> {
    pub db: &'a GameDatabase,
    pub path_service: &'a mut PathFindingService,
    pub events: &'a mut Vec<SimEvent>,
}

pub struct GameSimulation {
    pub terrain: MapTerrain,
    pub walkability: WalkabilityStore,
    pub occupied_grid: Grid<OccupiedCell>,

    pub units: VecMap<UnitId, UnitState>,
    pub projectiles: VecMap<ProjectileId, Projectile>,
    pub features: VecMap<FeatureId, MapFeature>,
    pub players: [Option<GamePlayerInfo>; MAX_PLAYERS],

    pub game_time: GameTime,
    pub paused: bool,

    /// Seeded per game; the only randomness source inside the simulation.
    pub rng: ChaCha8Rng,
}

impl GameSimulation {
    pub fn new(terrain: MapTerrain, db: &GameDatabase, seed: u64) -> Self {
        let mut walkability = WalkabilityStore::default();
        for (id, class) in db.movement_classes() {
            walkability.register(id, compute_walkable_grid(&terrain, class));
        }

        let occupied_grid = Grid::new(
            terrain.width_in_cells(),
            terrain.height_in_cells(),
            OccupiedCell::default(),
        );

        Self {
            terrain,
            walkability,
            occupied_grid,
            units: VecMap::new(),
            projectiles: VecMap::new(),
            features: VecMap::new(),
            players: Default::default(),
            game_time: GameTime(0),
            paused: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    pub fn add_player(&mut self, id: PlayerId, info: GamePlayerInfo) {
        let slot = &mut self.players[id.index()];
        assert!(slot.is_none(), "player slot {} already taken", id.0);
        *slot = Some(info);
    }

    pub fn player(&self, id: PlayerId) -> &GamePlayerInfo {
        self.players[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("no player in slot {}", id.0))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> &mut GamePlayerInfo {
        self.players[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("no player in slot {}", id.0))
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    pub fn rand_range(&mut self, min: i32, max: i32) -> i32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Footprint cells claimed by a unit of the given size centred at
    /// `position`.
    pub fn footprint_region(position: SimVector, footprint_x: u32, footprint_z: u32) -> DiscreteRect {
        let cell = SimScalar::from_num(CELL_WORLD_SIZE);
        let two = SimScalar::from_num(2);
        let x = (position.x / cell - SimScalar::from_num(footprint_x) / two).floor();
        let z = (position.z / cell - SimScalar::from_num(footprint_z) / two).floor();
        DiscreteRect::new(
            x.to_num::<i64>() as i32,
            z.to_num::<i64>() as i32,
            footprint_x,
            footprint_z,
        )
    }

    pub fn unit_footprint(&self, db: &GameDatabase, id: UnitId) -> DiscreteRect {
        let unit = self.units.get(id);
        let def = db.unit_definition(&unit.unit_type);
        Self::footprint_region(unit.position, def.footprint_x, def.footprint_z)
    }

    pub fn get_ground_height(&self, x: SimScalar, z: SimScalar) -> SimScalar {
        self.terrain.get_height_at(x, z)
    }

    /// Axis-aligned bounds of a unit's body.
    pub fn unit_aabb(&self, db: &GameDatabase, id: UnitId) -> (SimVector, SimVector) {
        let unit = self.units.get(id);
        let def = db.unit_definition(&unit.unit_type);
        let model = db.model(&def.object_name);
        let cell = SimScalar::from_num(CELL_WORLD_SIZE);
        let two = SimScalar::from_num(2);
        let half_x = SimScalar::from_num(def.footprint_x) * cell / two;
        let half_z = SimScalar::from_num(def.footprint_z) * cell / two;
        let min = SimVector::new(unit.position.x - half_x, unit.position.y, unit.position.z - half_z);
        let max = SimVector::new(
            unit.position.x + half_x,
            unit.position.y + model.height,
            unit.position.z + half_z,
        );
        (min, max)
    }

    pub fn point_in_unit_aabb(&self, db: &GameDatabase, id: UnitId, p: SimVector) -> bool {
        let (min, max) = self.unit_aabb(db, id);
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y && p.z >= min.z && p.z <= max.z
    }

    pub fn sphere_intersects_unit_aabb(
        &self,
        db: &GameDatabase,
        id: UnitId,
        center: SimVector,
        radius: SimScalar,
    ) -> bool {
        let (min, max) = self.unit_aabb(db, id);
        let clamped = SimVector::new(
            center.x.clamp(min.x, max.x),
            center.y.clamp(min.y, max.y),
            center.z.clamp(min.z, max.z),
        );
        (clamped - center).length_squared() <= radius * radius
    }

    // -----------------------------------------------------------------------
    // Occupation
    // -----------------------------------------------------------------------

    /// True when some cell of `rect` is claimed by a unit or feature other
    /// than `exclude`, by an impassable building cell, or lies off the map.
    pub fn is_collision_at(&self, rect: &DiscreteRect, exclude: Option<UnitId>) -> bool {
        if !self.occupied_grid.is_rect_in_bounds(rect) {
            return true;
        }
        self.occupied_grid.any_in_rect(rect, |cell| {
            let body_blocks = match cell.occupied {
                OccupiedType::None => false,
                OccupiedType::Unit(u) => Some(u) != exclude,
                OccupiedType::Feature(_) => true,
            };
            let building_blocks = cell
                .building
                .is_some_and(|b| Some(b.unit) != exclude && !b.passable);
            body_blocks || building_blocks
        })
    }

    pub fn is_adjacent_to_obstacle(&self, rect: &DiscreteRect) -> bool {
        let ring = rect.expand(1);
        let result = ring.cells().any(|p| {
            if rect.contains(p) {
                return false;
            }
            self.occupied_grid.try_get(p).is_some_and(|cell| {
                !matches!(cell.occupied, OccupiedType::None)
                    || cell.building.is_some_and(|b| !b.passable)
            })
        });
        result
    }

    pub fn is_passable_through_building(&self, p: Point) -> bool {
        self.occupied_grid
            .try_get(p)
            .and_then(|cell| cell.building)
            .is_some_and(|b| b.passable)
    }

    fn occupy_rect_with_unit(&mut self, rect: &DiscreteRect, id: UnitId) {
        self.occupied_grid
            .for_each_in_rect_mut(rect, |cell| cell.occupied = OccupiedType::Unit(id));
    }

    fn clear_unit_occupation(&mut self, rect: &DiscreteRect, id: UnitId) {
        self.occupied_grid.for_each_in_rect_mut(rect, |cell| {
            if cell.occupied == OccupiedType::Unit(id) {
                cell.occupied = OccupiedType::None;
            }
        });
    }

    /// Writes a building's yard map into the grid, honouring the current
    /// yard-open state.
    pub fn stamp_building_yard(&mut self, db: &GameDatabase, id: UnitId) {
        let unit = self.units.get(id);
        let yard_open = unit.yard_open;
        let unit_type = unit.unit_type.clone();
        let rect = self.unit_footprint(db, id);
        let yard_map = db.yard_map(&unit_type).cloned();

        for p in rect.cells() {
            if !self.occupied_grid.is_in_bounds(p) {
                continue;
            }
            let passable = yard_map
                .as_ref()
                .map(|m| {
                    let local_x = (p.x - rect.x) as usize;
                    let local_y = (p.y - rect.y) as usize;
                    m.get(local_x, local_y).is_passable(yard_open)
                })
                .unwrap_or(false);
            self.occupied_grid
                .get_mut(p.x as usize, p.y as usize)
                .building = Some(BuildingOccupiedCell { unit: id, passable });
        }
    }

    fn clear_building_yard(&mut self, rect: &DiscreteRect, id: UnitId) {
        self.occupied_grid.for_each_in_rect_mut(rect, |cell| {
            if cell.building.is_some_and(|b| b.unit == id) {
                cell.building = None;
            }
        });
    }

    /// Moves a mobile unit's occupation claim from `old_rect` to its
    /// current footprint.
    pub fn move_unit_occupation(&mut self, db: &GameDatabase, id: UnitId, old_rect: &DiscreteRect) {
        self.clear_unit_occupation(old_rect, id);
        let new_rect = self.unit_footprint(db, id);
        self.occupy_rect_with_unit(&new_rect, id);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Creates a unit at `position` (ground height is applied). Returns
    /// `None` when the footprint is blocked. `completed` distinguishes
    /// game-start spawns from construction skeletons.
    pub fn spawn_unit(
        &mut self,
        db: &GameDatabase,
        unit_type: &str,
        owner: PlayerId,
        position: SimVector,
        completed: bool,
    ) -> Option<UnitId> {
        let def = db.unit_definition(unit_type);
        let model = db.model(&def.object_name);
        let script = db.script(unit_type);

        let rect = Self::footprint_region(position, def.footprint_x, def.footprint_z);
        if self.is_collision_at(&rect, None) {
            return None;
        }

        let mut position = position;
        position.y = self.get_ground_height(position.x, position.z);

        let mut cob_env = crate::cob::ScriptEnvironment::new(script.static_var_count);
        let _ = cob_env.start_thread_by_name(script, "Create", vec![]);

        let weapons = def
            .weapons
            .iter()
            .map(|w| Some(UnitWeapon::new(w)))
            .collect();

        let unit = UnitState {
            unit_type: unit_type.to_string(),
            owner,
            position,
            previous_position: position,
            rotation: SimAngle(0),
            previous_rotation: SimAngle(0),
            turn_rate: def.turn_rate,
            current_speed: SimScalar::ZERO,
            target_angle: SimAngle(0),
            target_speed: SimScalar::ZERO,
            hit_points: if completed { def.max_damage } else { 1 },
            max_damage: def.max_damage,
            life_state: LifeState::Alive,
            behaviour_state: UnitBehavior::Idle,
            order_queue: Default::default(),
            build_queue: Default::default(),
            in_build_stance: false,
            yard_open: false,
            in_collision: false,
            activated: completed && def.activate_when_built,
            is_sufficiently_powered: true,
            fire_orders: Default::default(),
            last_attacker: None,
            build_time_completed: if completed {
                SimScalar::ONE
            } else {
                SimScalar::ZERO
            },
            metal_make: SimScalar::ZERO,
            energy_make: SimScalar::ZERO,
            metal_use: SimScalar::ZERO,
            energy_use: SimScalar::ZERO,
            previous_metal_use: SimScalar::ZERO,
            previous_energy_use: SimScalar::ZERO,
            build_metal_this_tick: SimScalar::ZERO,
            build_energy_this_tick: SimScalar::ZERO,
            pieces: pieces_for_model(model),
            cob_env,
            weapons,
        };

        let id = self.units.insert(unit);
        if def.is_mobile() {
            self.occupy_rect_with_unit(&rect, id);
        } else {
            self.stamp_building_yard(db, id);
        }

        debug!(unit = id.0, unit_type, "spawned unit");
        Some(id)
    }

    /// Removes a dead unit's remains from the grids and maps. The caller
    /// has already run death effects.
    pub fn remove_unit(&mut self, db: &GameDatabase, id: UnitId) {
        let rect = self.unit_footprint(db, id);
        let mobile = db.unit_definition(&self.units.get(id).unit_type).is_mobile();
        if mobile {
            self.clear_unit_occupation(&rect, id);
        } else {
            self.clear_building_yard(&rect, id);
        }
        self.units.remove(id);
    }

    pub fn spawn_feature(&mut self, db: &GameDatabase, feature: MapFeature) -> FeatureId {
        let def = db.feature_definition(&feature.feature_type);
        let rect = Self::footprint_region(feature.position, def.footprint_x, def.footprint_z);
        let blocking = def.blocking;
        let id = self.features.insert(feature);
        if blocking {
            self.occupied_grid.for_each_in_rect_mut(&rect, |cell| {
                if cell.occupied == OccupiedType::None {
                    cell.occupied = OccupiedType::Feature(id);
                }
            });
        }
        id
    }

    pub fn remove_feature(&mut self, db: &GameDatabase, id: FeatureId) {
        if let Some(feature) = self.features.try_get(id) {
            let def = db.feature_definition(&feature.feature_type);
            let rect = Self::footprint_region(feature.position, def.footprint_x, def.footprint_z);
            self.occupied_grid.for_each_in_rect_mut(&rect, |cell| {
                if cell.occupied == OccupiedType::Feature(id) {
                    cell.occupied = OccupiedType::None;
                }
            });
        }
        self.features.remove(id);
    }

    /// Pathfinding view for one unit's movement class.
    pub fn path_view(&self, movement_class: MovementClassId, exclude: UnitId) -> SimPathView<'_> {
        SimPathView {
            sim: self,
            movement_class,
            exclude,
        }
    }
}

/// [`PathWorldView`] over the live simulation for one pathing unit.
pub struct SimPathView<'a> {
    sim: &'a GameSimulation,
    movement_class: MovementClassId,
    exclude: UnitId,
}

impl PathWorldView for SimPathView<'_> {
    fn is_footprint_free(&self, rect: &DiscreteRect) -> bool {
        !self.sim.is_collision_at(rect, Some(self.exclude))
    }

    fn is_grid_point_walkable(&self, p: Point) -> bool {
        self.sim.walkability.is_walkable(self.movement_class, p)
    }

    fn is_passable_through_building(&self, p: Point) -> bool {
        self.sim.is_passable_through_building(p)
    }

    fn is_adjacent_to_obstacle(&self, rect: &DiscreteRect) -> bool {
        self.sim.is_adjacent_to_obstacle(rect)
    }
}
