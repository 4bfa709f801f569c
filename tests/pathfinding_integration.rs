//! Pathfinding through the live simulation: requests queue up, results are
//! delivered at tick boundaries, and units route around world obstacles.

mod common;

use common::{scalar, TestWorld};
use kestrel::commands::{IssueKind, PlayerCommand, PlayerUnitCommand, UnitCommand, UnitOrder};
use kestrel::data::FeatureDefinition;
use kestrel::fixed_math::{SimAngle, SimVector};
use kestrel::ids::PlayerId;
use kestrel::sim::{MapFeature, UnitBehavior};

fn move_command(unit: kestrel::ids::UnitId, destination: SimVector) -> PlayerCommand {
    PlayerCommand::UnitCommand(PlayerUnitCommand {
        unit,
        command: UnitCommand::IssueOrder {
            order: UnitOrder::Move(destination),
            kind: IssueKind::Immediate,
        },
    })
}

fn boulder() -> FeatureDefinition {
    FeatureDefinition {
        footprint_x: 1,
        footprint_z: 1,
        height: scalar(8),
        blocking: true,
        reclaimable: false,
        flammable: false,
        metal: scalar(0),
        energy: scalar(0),
        damage: 100,
        object_name: None,
    }
}

#[test]
fn unit_routes_around_a_feature_wall() {
    let mut world = TestWorld::new(5);
    world.add_players(1);
    world.db.add_feature_definition("ROCK", boulder());

    // A wall of rocks down cell column 6, rows 1..=10, with gaps only at
    // the map edge rows.
    for row in 1..=10 {
        let center = world
            .sim
            .terrain
            .cell_to_world(kestrel::collections::Point::new(6, row))
            + SimVector::new(scalar(8), scalar(0), scalar(8));
        world.sim.spawn_feature(
            &world.db,
            MapFeature::new("ROCK", center, SimAngle(0)),
        );
    }

    let start = SimVector::new(scalar(40), scalar(0), scalar(88)); // cell (2, 5)
    let goal = SimVector::new(scalar(168), scalar(0), scalar(88)); // cell (10, 5)
    let tank = world
        .sim
        .spawn_unit(&world.db, "TANK", PlayerId(0), start, true)
        .unwrap();

    world.tick(&[(PlayerId(0), vec![move_command(tank, goal)])]);

    let mut arrived = false;
    for _ in 0..600 {
        world.tick(&[]);
        let unit = world.sim.units.get(tank);

        // Never standing inside the wall column's blocked band.
        let cell = world.sim.terrain.world_to_cell(unit.position);
        if cell.x == 6 {
            assert!(
                !(1..=10).contains(&cell.y),
                "unit walked through the wall at {cell:?}"
            );
        }

        if matches!(unit.behaviour_state, UnitBehavior::Idle) {
            arrived = true;
            break;
        }
    }
    assert!(arrived, "unit never finished its move order");

    let final_position = world.sim.units.get(tank).position;
    let miss = (final_position - goal).horizontal_length();
    assert!(miss <= scalar(8), "stopped {miss} away from the goal");
}

#[test]
fn replacing_a_move_order_drops_the_stale_path() {
    let mut world = TestWorld::new(6);
    world.add_players(1);

    let start = SimVector::new(scalar(40), scalar(0), scalar(40));
    let tank = world
        .sim
        .spawn_unit(&world.db, "TANK", PlayerId(0), start, true)
        .unwrap();

    let first_goal = SimVector::new(scalar(40), scalar(0), scalar(200));
    let second_goal = SimVector::new(scalar(200), scalar(0), scalar(40));

    // Queue the first order but replace it before its path can be
    // delivered (delivery happens on the next tick).
    world.tick(&[(PlayerId(0), vec![move_command(tank, first_goal)])]);
    world.tick(&[(PlayerId(0), vec![move_command(tank, second_goal)])]);

    let mut arrived = false;
    for _ in 0..600 {
        world.tick(&[]);
        if matches!(
            world.sim.units.get(tank).behaviour_state,
            UnitBehavior::Idle
        ) {
            arrived = true;
            break;
        }
    }
    assert!(arrived);

    let final_position = world.sim.units.get(tank).position;
    let to_second = (final_position - second_goal).horizontal_length();
    let to_first = (final_position - first_goal).horizontal_length();
    assert!(
        to_second < to_first,
        "unit obeyed the cancelled order instead of the replacement"
    );
    assert!(to_second <= scalar(8));
}

#[test]
fn occupied_grid_tracks_unit_movement() {
    let mut world = TestWorld::new(9);
    world.add_players(1);

    let start = SimVector::new(scalar(8), scalar(0), scalar(8));
    let tank = world
        .sim
        .spawn_unit(&world.db, "TANK", PlayerId(0), start, true)
        .unwrap();

    let goal = SimVector::new(scalar(8), scalar(0), scalar(104));
    world.tick(&[(PlayerId(0), vec![move_command(tank, goal)])]);

    for _ in 0..200 {
        world.tick(&[]);
        // The cell under the unit is always claimed by it.
        let rect = world.sim.unit_footprint(&world.db, tank);
        let cell = world
            .sim
            .occupied_grid
            .try_get(rect.top_left())
            .expect("unit on the map");
        assert_eq!(
            cell.occupied,
            kestrel::sim::OccupiedType::Unit(tank),
            "occupation out of sync with position"
        );
        if matches!(
            world.sim.units.get(tank).behaviour_state,
            UnitBehavior::Idle
        ) {
            break;
        }
    }
}
