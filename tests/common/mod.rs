//! Shared fixtures: a small hand-assembled content set and driver helpers.

use kestrel::cob::{Axis, CobScript, ScriptAssembler};
use kestrel::data::{
    GameDatabase, MovementClassDefinition, ProjectilePhysicsType, ProjectileRenderType,
    UnitDefinition, UnitModelDefinition, UnitPieceDefinition, WeaponDefinition,
};
use kestrel::fixed_math::{SimAngle, SimScalar, SimVector};
use kestrel::ids::PlayerId;
use kestrel::pathfinding::PathFindingService;
use kestrel::sim::{GamePlayerInfo, GameSimulation, PlayerType, SimEvent, SimulationContext};
use kestrel::terrain::MapTerrain;

pub fn scalar(v: i64) -> SimScalar {
    SimScalar::from_num(v)
}

/// A unit definition with inert defaults; tests override what they need.
pub fn base_unit_def(name: &str, model: &str) -> UnitDefinition {
    UnitDefinition {
        unit_name: name.to_string(),
        object_name: model.to_string(),
        movement_class: None,
        turn_rate: scalar(30000),
        max_velocity: SimScalar::ZERO,
        acceleration: SimScalar::ZERO,
        brake_rate: SimScalar::ZERO,
        footprint_x: 1,
        footprint_z: 1,
        max_slope: 10,
        max_water_slope: 10,
        min_water_depth: 0,
        max_water_depth: 0,
        can_attack: false,
        can_move: false,
        can_guard: false,
        commander: false,
        max_damage: 100,
        bm_code: false,
        floater: false,
        can_hover: false,
        weapons: vec![],
        explode_as: None,
        builder: false,
        build_time: 100,
        build_cost_energy: scalar(50),
        build_cost_metal: scalar(50),
        worker_time: 0,
        build_distance: 64,
        on_offable: false,
        activate_when_built: true,
        energy_make: SimScalar::ZERO,
        metal_make: SimScalar::ZERO,
        energy_use: SimScalar::ZERO,
        metal_use: SimScalar::ZERO,
        energy_storage: SimScalar::ZERO,
        metal_storage: SimScalar::ZERO,
        yard_map: None,
        corpse: None,
    }
}

pub fn single_piece_model(piece: &str) -> UnitModelDefinition {
    UnitModelDefinition::new(
        piece,
        scalar(10),
        vec![UnitPieceDefinition {
            name: piece.to_string(),
            origin: SimVector::ZERO,
            parent: None,
        }],
    )
    .unwrap()
}

/// A script whose Create entry point just returns.
pub fn inert_script(piece: &str) -> CobScript {
    let mut asm = ScriptAssembler::new(0, &[piece]);
    asm.function("Create");
    asm.ret();
    asm.finish()
}

pub fn basic_gun() -> WeaponDefinition {
    WeaponDefinition {
        physics_type: ProjectilePhysicsType::LineOfSight,
        max_range: scalar(200),
        reload_time: SimScalar::ONE,
        start_smoke: false,
        end_smoke: false,
        smoke_trail: None,
        burst: 1,
        burst_interval: SimScalar::from_num(0.2),
        spray_angle: SimAngle(0),
        tolerance: SimAngle(512),
        pitch_tolerance: SimAngle(512),
        render_type: ProjectileRenderType::Laser {
            duration: scalar(2),
        },
        velocity: scalar(8),
        command_fire: false,
        damage: [("DEFAULT".to_string(), 30u32)].into_iter().collect(),
        damage_radius: scalar(4),
        weapon_timer: Some(120),
        random_decay: None,
        sound_trigger: false,
        ground_bounce: false,
    }
}

/// Content set used by most scenarios:
/// - TANK: mobile unit, 2/tick top speed, no weapons
/// - RADAR: static unit whose Create script turns, waits, sleeps, then
///   activates
/// - TURRET: static unit with a gun and no aim script
pub fn test_database() -> GameDatabase {
    let mut db = GameDatabase::new();

    db.add_movement_class(MovementClassDefinition {
        name: "TANKMC".to_string(),
        footprint_x: 1,
        footprint_z: 1,
        min_water_depth: 0,
        max_water_depth: 0,
        max_slope: 10,
        max_water_slope: 10,
    });

    let mut tank = base_unit_def("TANK", "tankmodel");
    tank.movement_class = Some("TANKMC".to_string());
    tank.bm_code = true;
    tank.can_move = true;
    tank.max_velocity = scalar(2);
    tank.acceleration = SimScalar::ONE;
    tank.brake_rate = SimScalar::ONE;
    db.add_model("tankmodel", single_piece_model("base"));
    db.add_script("TANK", inert_script("base"));
    db.add_unit_definition(tank);

    let radar = base_unit_def("RADAR", "radarmodel");
    db.add_model(
        "radarmodel",
        UnitModelDefinition::new(
            "radarmodel",
            scalar(10),
            vec![
                UnitPieceDefinition {
                    name: "base".to_string(),
                    origin: SimVector::ZERO,
                    parent: None,
                },
                UnitPieceDefinition {
                    name: "dish".to_string(),
                    origin: SimVector::new(scalar(0), scalar(6), scalar(0)),
                    parent: Some("base".to_string()),
                },
            ],
        )
        .unwrap(),
    );
    db.add_script("RADAR", radar_script());
    let mut radar = radar;
    radar.activate_when_built = false;
    db.add_unit_definition(radar);

    let mut turret = base_unit_def("TURRET", "turretmodel");
    turret.can_attack = true;
    turret.max_damage = 90;
    turret.weapons = vec!["GUN".to_string()];
    db.add_model("turretmodel", single_piece_model("base"));
    db.add_script("TURRET", inert_script("base"));
    db.add_unit_definition(turret);
    db.add_weapon_definition("GUN", basic_gun());

    // A vehicle factory: one fully passable yard cell, builds at 300
    // effort per second.
    let mut factory = base_unit_def("FACTORY", "factorymodel");
    factory.builder = true;
    factory.worker_time = 300;
    factory.yard_map = Some("f".to_string());
    db.add_model("factorymodel", single_piece_model("base"));
    db.add_script("FACTORY", inert_script("base"));
    db.add_unit_definition(factory);

    // A hungry consumer for stall scenarios.
    let mut drain = base_unit_def("DRAIN", "drainmodel");
    drain.energy_use = scalar(2000);
    drain.on_offable = true;
    db.add_model("drainmodel", single_piece_model("base"));
    db.add_script("DRAIN", inert_script("base"));
    db.add_unit_definition(drain);

    db.finalise().expect("test content is self-consistent");
    db
}

/// Create script: turn the dish half a turn at 4096/tick, wait for the
/// turn, sleep half a second, then activate.
fn radar_script() -> CobScript {
    let mut asm = ScriptAssembler::new(0, &["base", "dish"]);
    let dish = asm.piece("dish");
    asm.function("Create");
    asm.push_constant(32768)
        .push_constant(4096)
        .turn_piece(dish, Axis::Y)
        .wait_for_turn(dish, Axis::Y)
        .push_constant(500)
        .sleep()
        .push_constant(1) // value id: activation
        .push_constant(1)
        .set_value()
        .ret();
    asm.finish()
}

pub struct TestWorld {
    pub db: GameDatabase,
    pub sim: GameSimulation,
    pub path_service: PathFindingService,
    pub events: Vec<SimEvent>,
}

impl TestWorld {
    pub fn new(seed: u64) -> Self {
        let db = test_database();
        let sim = GameSimulation::new(MapTerrain::flat(24, 24), &db, seed);
        Self {
            db,
            sim,
            path_service: PathFindingService::default(),
            events: Vec::new(),
        }
    }

    pub fn add_players(&mut self, count: u32) {
        for i in 0..count {
            self.sim.add_player(
                PlayerId(i),
                GamePlayerInfo::new(PlayerType::Human, i as u8, "CORE"),
            );
        }
    }

    /// Runs one tick with the given per-player command lists.
    pub fn tick(&mut self, commands: &[(PlayerId, Vec<kestrel::commands::PlayerCommand>)]) {
        let mut ctx = SimulationContext {
            db: &self.db,
            path_service: &mut self.path_service,
            events: &mut self.events,
        };
        kestrel::sim::tick(&mut self.sim, &mut ctx, commands);
    }

    pub fn run_ticks(&mut self, count: u32) {
        for _ in 0..count {
            self.tick(&[]);
        }
    }
}
