//! Lockstep plumbing: the command buffer shared between the network and
//! simulation threads, and the wire encoding of per-tick messages.

pub use protocol::{decode_message, encode_message, TickMessage};
pub use service::PlayerCommandService;

mod protocol;
mod service;
