//! Deterministic real-time-strategy simulation engine.
//!
//! The core of the engine is a fixed-tick world update that advances units,
//! projectiles, map state and player economies in lockstep across networked
//! players: every peer runs the identical simulation from identical inputs,
//! the network carries commands only, and a rolling hash of the state
//! detects divergence.
//!
//! The crate is a library driven by direct API calls. A typical driver loop:
//!
//! ```ignore
//! while let Some(commands) = command_service.try_pop_commands() {
//!     sim::tick(&mut simulation, &mut context, &commands);
//!     let hash = hash::compute_hash_of(&simulation);
//!     command_service.push_hash(local_player, hash);
//!     if !command_service.check_hashes() {
//!         break; // desync, surface to the caller
//!     }
//! }
//! ```
//!
//! Rendering, audio, window I/O and binary asset decoding live outside this
//! crate; they consume the read-only view in [`render`] and the event
//! stream a tick produces.

pub mod assets;
pub mod cob;
pub mod collections;
pub mod commands;
pub mod data;
pub mod fixed_math;
pub mod hash;
pub mod ids;
pub mod lockstep;
pub mod pathfinding;
pub mod render;
pub mod sim;
pub mod terrain;
