//! The numeric substrate of the simulation.
//!
//! Lockstep peers compare state hashes every tick, so every arithmetic
//! result inside the simulation has to come out bit-for-bit the same on
//! every machine. Floats don't give that guarantee once different
//! platforms and compilers are involved; everything here is fixed-point
//! (or integer, for angles), and simulation code is expected to use these
//! types exclusively.

use fixed::types::I48F16;

pub use angle::{
    angle_between, angle_between_with_direction, atan2, cos, sin, turn_towards, SimAngle,
    HALF_TURN, QUARTER_TURN,
};
pub use matrix::Matrix4;
pub use vec3::SimVector;

mod angle;
mod matrix;
mod vec3;

/// The simulation's real-number type: signed 64-bit fixed point with 16
/// fractional bits.
///
/// Sixteen fractional bits give steps of 1/65536, which is also the unit
/// scripts use for linear values, so script numbers convert by
/// reinterpretation rather than arithmetic. The 48 integer bits are far
/// more range than any map needs; overflow is not a practical concern.
pub type SimScalar = I48F16;

/// Shorthand constructor for scalar literals in tests and definitions.
pub fn scalar(v: i64) -> SimScalar {
    SimScalar::from_num(v)
}

pub fn abs(v: SimScalar) -> SimScalar {
    if v < SimScalar::ZERO {
        -v
    } else {
        v
    }
}

/// Square root of the sum of squares, computed with the fixed-point
/// square root so results are bit-identical everywhere.
pub fn hypot(a: SimScalar, b: SimScalar) -> SimScalar {
    (a * a + b * b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypot_of_pythagorean_triple_is_exact() {
        assert_eq!(hypot(scalar(3), scalar(4)), scalar(5));
        assert_eq!(hypot(scalar(-5), scalar(12)), scalar(13));
    }

    #[test]
    fn abs_flips_negatives_only() {
        assert_eq!(abs(scalar(-7)), scalar(7));
        assert_eq!(abs(scalar(7)), scalar(7));
        assert_eq!(abs(SimScalar::ZERO), SimScalar::ZERO);
    }
}
