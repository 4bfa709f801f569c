use std::collections::VecDeque;
use std::sync::Mutex;

use crate::commands::PlayerCommand;
use crate::hash::GameHash;
use crate::ids::PlayerId;

#[derive(Default)]
struct Buffers {
    /// Per-player FIFO of per-tick command lists, in registration order.
    commands: Vec<(PlayerId, VecDeque<Vec<PlayerCommand>>)>,
    /// Per-player FIFO of per-tick state hashes, same order.
    hashes: Vec<(PlayerId, VecDeque<GameHash>)>,
}

impl Buffers {
    fn command_queue(&mut self, player: PlayerId) -> &mut VecDeque<Vec<PlayerCommand>> {
        self.commands
            .iter_mut()
            .find(|(id, _)| *id == player)
            .map(|(_, q)| q)
            .unwrap_or_else(|| panic!("player {} not registered", player.0))
    }

    fn hash_queue(&mut self, player: PlayerId) -> &mut VecDeque<GameHash> {
        self.hashes
            .iter_mut()
            .find(|(id, _)| *id == player)
            .map(|(_, q)| q)
            .unwrap_or_else(|| panic!("player {} not registered", player.0))
    }
}

/// The rendezvous point between the network thread and the simulation
/// thread. A tick's worth of commands is released only when every
/// registered player has one queued, and never partially.
///
/// One mutex covers all internal state; no method blocks beyond that lock
/// and no lock is held across a tick.
#[derive(Default)]
pub struct PlayerCommandService {
    buffers: Mutex<Buffers>,
}

impl PlayerCommandService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Must be called for every participating player before the first pop.
    /// Registration order defines the order of popped command lists, so all
    /// peers must register players identically.
    pub fn register_player(&self, player: PlayerId) {
        let mut buffers = self.buffers.lock().unwrap();
        assert!(
            !buffers.commands.iter().any(|(id, _)| *id == player),
            "player {} already registered",
            player.0
        );
        buffers.commands.push((player, VecDeque::new()));
        buffers.hashes.push((player, VecDeque::new()));
    }

    pub fn push_commands(&self, player: PlayerId, commands: Vec<PlayerCommand>) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.command_queue(player).push_back(commands);
    }

    /// Pops one tick's commands for every player, or `None` if any player
    /// has nothing queued yet. All-or-nothing: no queue is consumed unless
    /// all are.
    pub fn try_pop_commands(&self) -> Option<Vec<(PlayerId, Vec<PlayerCommand>)>> {
        let mut buffers = self.buffers.lock().unwrap();

        if buffers.commands.iter().any(|(_, q)| q.is_empty()) {
            return None;
        }

        Some(
            buffers
                .commands
                .iter_mut()
                .map(|(id, q)| (*id, q.pop_front().expect("checked non-empty")))
                .collect(),
        )
    }

    pub fn push_hash(&self, player: PlayerId, hash: GameHash) {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.hash_queue(player).push_back(hash);
    }

    /// Compares queued hashes tick by tick while every player has one.
    /// Returns false on the first tick where they disagree.
    pub fn check_hashes(&self) -> bool {
        let mut buffers = self.buffers.lock().unwrap();

        while !buffers.hashes.is_empty() && buffers.hashes.iter().all(|(_, q)| !q.is_empty()) {
            let mut base: Option<GameHash> = None;
            let mut matching = true;
            for (_, queue) in buffers.hashes.iter_mut() {
                let hash = queue.pop_front().expect("checked non-empty");
                match base {
                    None => base = Some(hash),
                    Some(b) => matching = matching && b == hash,
                }
            }
            if !matching {
                return false;
            }
        }

        true
    }

    pub fn buffered_command_count(&self, player: PlayerId) -> usize {
        let mut buffers = self.buffers.lock().unwrap();
        buffers.command_queue(player).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PlayerCommand;

    #[test]
    fn pop_blocks_until_every_player_has_commands() {
        let service = PlayerCommandService::new();
        service.register_player(PlayerId(0));
        service.register_player(PlayerId(1));

        service.push_commands(PlayerId(0), vec![PlayerCommand::PauseGame]);
        assert!(service.try_pop_commands().is_none());
        // The failed pop must not have consumed player 0's entry.
        assert_eq!(service.buffered_command_count(PlayerId(0)), 1);

        service.push_commands(PlayerId(1), vec![]);
        let popped = service.try_pop_commands().expect("both queues populated");
        assert_eq!(popped.len(), 2);
        assert_eq!(popped[0], (PlayerId(0), vec![PlayerCommand::PauseGame]));
        assert_eq!(popped[1], (PlayerId(1), vec![]));

        assert_eq!(service.buffered_command_count(PlayerId(0)), 0);
        assert_eq!(service.buffered_command_count(PlayerId(1)), 0);
        assert!(service.try_pop_commands().is_none());
    }

    #[test]
    fn matching_hashes_pass() {
        let service = PlayerCommandService::new();
        service.register_player(PlayerId(0));
        service.register_player(PlayerId(1));

        service.push_hash(PlayerId(0), GameHash(42));
        assert!(service.check_hashes());

        service.push_hash(PlayerId(1), GameHash(42));
        assert!(service.check_hashes());
    }

    #[test]
    fn diverging_hashes_fail() {
        let service = PlayerCommandService::new();
        service.register_player(PlayerId(0));
        service.register_player(PlayerId(1));

        service.push_hash(PlayerId(0), GameHash(42));
        service.push_hash(PlayerId(1), GameHash(43));
        assert!(!service.check_hashes());
    }

    #[test]
    fn hash_check_drains_multiple_ticks() {
        let service = PlayerCommandService::new();
        service.register_player(PlayerId(0));
        service.register_player(PlayerId(1));

        for tick in 0..3u32 {
            service.push_hash(PlayerId(0), GameHash(tick));
            service.push_hash(PlayerId(1), GameHash(tick));
        }
        assert!(service.check_hashes());

        // All queues drained; a later divergence is still caught.
        service.push_hash(PlayerId(0), GameHash(7));
        service.push_hash(PlayerId(1), GameHash(8));
        assert!(!service.check_hashes());
    }
}
