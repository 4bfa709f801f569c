use serde::{Deserialize, Serialize};

use crate::commands::PlayerCommand;
use crate::hash::GameHash;
use crate::ids::GameTime;

/// What one peer sends for one tick: the commands its player issued and the
/// hash of the previous tick's state for divergence checking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickMessage {
    pub tick: GameTime,
    pub commands: Vec<PlayerCommand>,
    pub previous_hash: GameHash,
}

pub fn encode_message(message: &TickMessage) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(message)
}

pub fn decode_message(bytes: &[u8]) -> Result<TickMessage, bincode::Error> {
    bincode::deserialize(bytes)
}
