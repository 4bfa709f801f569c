//! Lockstep driver loop: command release, hash exchange, desync detection.

mod common;

use common::{scalar, TestWorld};
use kestrel::commands::{IssueKind, PlayerCommand, PlayerUnitCommand, UnitCommand, UnitOrder};
use kestrel::fixed_math::SimVector;
use kestrel::hash::compute_hash_of;
use kestrel::ids::PlayerId;
use kestrel::lockstep::PlayerCommandService;

#[test]
fn tick_is_blocked_until_every_player_delivers() {
    let service = PlayerCommandService::new();
    service.register_player(PlayerId(0));
    service.register_player(PlayerId(1));

    service.push_commands(PlayerId(0), vec![PlayerCommand::PauseGame]);
    assert!(service.try_pop_commands().is_none());

    service.push_commands(PlayerId(1), vec![]);
    let commands = service.try_pop_commands().expect("all players delivered");
    assert_eq!(commands.len(), 2);
    assert!(service.try_pop_commands().is_none());
}

/// Two peers run the same inputs through the full stack; their hash streams
/// agree until one peer's unit state is corrupted.
#[test]
fn peers_agree_until_state_is_corrupted() {
    let spawn = SimVector::new(scalar(8), scalar(0), scalar(8));
    let destination = SimVector::new(scalar(8), scalar(0), scalar(120));

    let mut peer_a = TestWorld::new(42);
    let mut peer_b = TestWorld::new(42);
    for world in [&mut peer_a, &mut peer_b] {
        world.add_players(2);
    }
    let tank_a = peer_a
        .sim
        .spawn_unit(&peer_a.db, "TANK", PlayerId(0), spawn, true)
        .unwrap();
    let tank_b = peer_b
        .sim
        .spawn_unit(&peer_b.db, "TANK", PlayerId(0), spawn, true)
        .unwrap();
    assert_eq!(tank_a, tank_b);

    let service = PlayerCommandService::new();
    service.register_player(PlayerId(0));
    service.register_player(PlayerId(1));

    let order = PlayerCommand::UnitCommand(PlayerUnitCommand {
        unit: tank_a,
        command: UnitCommand::IssueOrder {
            order: UnitOrder::Move(destination),
            kind: IssueKind::Immediate,
        },
    });

    // Healthy run: both peers apply identical released command sets.
    for tick_number in 0..30u32 {
        let player_0_commands = if tick_number == 0 {
            vec![order.clone()]
        } else {
            vec![]
        };
        service.push_commands(PlayerId(0), player_0_commands);
        service.push_commands(PlayerId(1), vec![]);

        let released = service.try_pop_commands().expect("both players queued");
        peer_a.tick(&released);
        peer_b.tick(&released);

        service.push_hash(PlayerId(0), compute_hash_of(&peer_a.sim));
        service.push_hash(PlayerId(1), compute_hash_of(&peer_b.sim));
        assert!(service.check_hashes(), "desync on healthy tick {tick_number}");
    }

    // Corrupt one peer: the very next hash exchange reports divergence.
    peer_b.sim.units.get_mut(tank_b).hit_points -= 1;

    service.push_commands(PlayerId(0), vec![]);
    service.push_commands(PlayerId(1), vec![]);
    let released = service.try_pop_commands().unwrap();
    peer_a.tick(&released);
    peer_b.tick(&released);

    service.push_hash(PlayerId(0), compute_hash_of(&peer_a.sim));
    service.push_hash(PlayerId(1), compute_hash_of(&peer_b.sim));
    assert!(!service.check_hashes(), "corruption went undetected");
}
