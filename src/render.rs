//! Read-only view support for the renderer.
//!
//! Between ticks the renderer reads simulation state through shared
//! references and interpolates the body and piece transforms using the
//! `previous_*` companion fields and a fractional progress through the
//! current tick. Floats are fine here: nothing on this side ever feeds back
//! into the simulation.

use crate::fixed_math::{angle_between_with_direction, SimAngle, SimScalar, SimVector};
use crate::ids::UnitId;
use crate::sim::GameSimulation;

/// Progress through the current tick, in `[0, 1)`.
pub type Frac = f32;

pub fn lerp_scalar(previous: SimScalar, current: SimScalar, frac: Frac) -> f32 {
    let a = previous.to_num::<f32>();
    let b = current.to_num::<f32>();
    a + (b - a) * frac
}

pub fn lerp_vector(previous: SimVector, current: SimVector, frac: Frac) -> [f32; 3] {
    [
        lerp_scalar(previous.x, current.x, frac),
        lerp_scalar(previous.y, current.y, frac),
        lerp_scalar(previous.z, current.z, frac),
    ]
}

/// Interpolates the short way round, in radians.
pub fn lerp_angle(previous: SimAngle, current: SimAngle, frac: Frac) -> f32 {
    let (anticlockwise, delta) = angle_between_with_direction(previous, current);
    let step = f32::from(delta.0) / 32768.0 * std::f32::consts::PI * frac;
    let base = previous.to_radians_f32();
    if anticlockwise {
        base + step
    } else {
        base - step
    }
}

/// One piece, ready to draw.
pub struct PieceRenderState {
    pub name: String,
    pub visible: bool,
    pub shaded: bool,
    pub offset: [f32; 3],
    /// X, Y, Z rotations in radians; apply Z then X then Y, matching the
    /// simulation's transform order.
    pub rotations: [f32; 3],
}

/// One unit, ready to draw.
pub struct UnitRenderState {
    pub unit_type: String,
    pub position: [f32; 3],
    /// Yaw in radians.
    pub rotation: f32,
    /// Team color index of the owning player.
    pub color: u8,
    pub pieces: Vec<PieceRenderState>,
}

/// Snapshot of a unit at `frac` through the current tick.
pub fn unit_render_state(sim: &GameSimulation, id: UnitId, frac: Frac) -> UnitRenderState {
    let unit = sim.units.get(id);
    let color = sim.player(unit.owner).color;

    let pieces = unit
        .pieces
        .iter()
        .map(|piece| PieceRenderState {
            name: piece.name.clone(),
            visible: piece.visible,
            shaded: piece.shaded,
            offset: lerp_vector(piece.previous_offset, piece.offset, frac),
            rotations: [
                lerp_angle(piece.previous_rotations[0], piece.rotations[0], frac),
                lerp_angle(piece.previous_rotations[1], piece.rotations[1], frac),
                lerp_angle(piece.previous_rotations[2], piece.rotations[2], frac),
            ],
        })
        .collect();

    UnitRenderState {
        unit_type: unit.unit_type.clone(),
        position: lerp_vector(unit.previous_position, unit.position, frac),
        rotation: lerp_angle(unit.previous_rotation, unit.rotation, frac),
        color,
        pieces,
    }
}

/// Projectile positions for the renderer, interpolated like units.
pub fn projectile_positions(sim: &GameSimulation, frac: Frac) -> Vec<[f32; 3]> {
    sim.projectiles
        .values()
        .map(|p| lerp_vector(p.previous_position, p.position, frac))
        .collect()
}
