//! Binary angles.
//!
//! Simulation angles are 16-bit turn fractions: `0` faces +Z and the value
//! wraps modulo 2^16. All arithmetic is wrapping, so "half a turn the other
//! way" and normalisation fall out of the representation for free.

use serde::{Deserialize, Serialize};

use super::SimScalar;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimAngle(pub u16);

pub const HALF_TURN: SimAngle = SimAngle(1 << 15);
pub const QUARTER_TURN: SimAngle = SimAngle(1 << 14);
pub const EIGHTH_TURN: SimAngle = SimAngle(1 << 13);

impl SimAngle {
    /// Reinterprets the integer part of a non-negative scalar as an angle,
    /// wrapping modulo one turn. Used when scripts feed scalar speeds into
    /// angular steps.
    pub fn from_scalar(s: SimScalar) -> SimAngle {
        debug_assert!(s >= SimScalar::ZERO);
        SimAngle(s.to_num::<i64>() as u16)
    }

    /// Conversion for the render/audio boundary. Never used in simulation
    /// arithmetic.
    pub fn to_radians_f32(self) -> f32 {
        let half_turns = f32::from(self.0) / 32768.0;
        let wrapped = if half_turns >= 1.0 {
            half_turns - 2.0
        } else {
            half_turns
        };
        wrapped * std::f32::consts::PI
    }

    /// Inverse of [`SimAngle::to_radians_f32`], again render-side only.
    pub fn from_radians_f32(radians: f32) -> SimAngle {
        SimAngle((radians / std::f32::consts::PI * 32768.0).round() as i32 as u16)
    }
}

impl std::ops::Add for SimAngle {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        SimAngle(self.0.wrapping_add(rhs.0))
    }
}

impl std::ops::AddAssign for SimAngle {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}

impl std::ops::Sub for SimAngle {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        SimAngle(self.0.wrapping_sub(rhs.0))
    }
}

impl std::ops::SubAssign for SimAngle {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}

impl std::ops::Neg for SimAngle {
    type Output = Self;
    fn neg(self) -> Self {
        SimAngle(self.0.wrapping_neg())
    }
}

/// The short-way difference between two angles, at most half a turn.
pub fn angle_between(a: SimAngle, b: SimAngle) -> SimAngle {
    let turn = b - a;
    if turn.0 > HALF_TURN.0 {
        -turn
    } else {
        turn
    }
}

/// Like [`angle_between`], but also reports the direction: `true` means the
/// short way from `a` to `b` is anticlockwise (increasing angle).
pub fn angle_between_with_direction(a: SimAngle, b: SimAngle) -> (bool, SimAngle) {
    let turn = b - a;
    if turn.0 > HALF_TURN.0 {
        (false, -turn)
    } else {
        (true, turn)
    }
}

pub fn angle_between_is_less_or_equal(a: SimAngle, b: SimAngle, c: SimAngle) -> bool {
    angle_between(a, b).0 <= c.0
}

/// Moves `current` towards `target` by at most `max_turn`, taking the
/// shorter way round. Returns `target` exactly once it is within reach.
pub fn turn_towards(current: SimAngle, target: SimAngle, max_turn: SimAngle) -> SimAngle {
    let (anticlockwise, delta) = angle_between_with_direction(current, target);

    if delta.0 <= max_turn.0 {
        target
    } else if anticlockwise {
        current + max_turn
    } else {
        current - max_turn
    }
}

// CORDIC over the binary angle. Angles are carried as Q32 turn fractions and
// vectors in Q30, which keeps every intermediate inside i64. arctan(2^-i)
// entries are pre-scaled turn fractions.
const CORDIC_ATAN: [i64; 24] = [
    536870912, 316933406, 167458907, 85004756, 42667331, 21354465, 10679838, 5340245, 2670163,
    1335087, 667544, 333772, 166886, 83443, 41722, 20861, 10430, 5215, 2608, 1304, 652, 326, 163,
    81,
];

// Product of cos(arctan(2^-i)), in Q30. Pre-loading the start vector with it
// cancels the rotation gain.
const CORDIC_GAIN_INV: i64 = 652032874;

const QUARTER_TURN_Q32: i64 = 1 << 30;
const HALF_TURN_Q32: i64 = 1 << 31;

fn cordic_sin_cos(angle: SimAngle) -> (SimScalar, SimScalar) {
    // Cardinal angles are exact by definition; everything else is CORDIC.
    match angle.0 {
        0 => return (SimScalar::ZERO, SimScalar::ONE),
        0x4000 => return (SimScalar::ONE, SimScalar::ZERO),
        0x8000 => return (SimScalar::ZERO, -SimScalar::ONE),
        0xC000 => return (-SimScalar::ONE, SimScalar::ZERO),
        _ => {}
    }

    let mut z = i64::from(angle.0 as i16) << 16;
    let mut flip = false;
    if z > QUARTER_TURN_Q32 {
        z -= HALF_TURN_Q32;
        flip = true;
    } else if z < -QUARTER_TURN_Q32 {
        z += HALF_TURN_Q32;
        flip = true;
    }

    let mut x = CORDIC_GAIN_INV;
    let mut y = 0i64;
    for (i, &a) in CORDIC_ATAN.iter().enumerate() {
        if z >= 0 {
            let nx = x - (y >> i);
            y += x >> i;
            x = nx;
            z -= a;
        } else {
            let nx = x + (y >> i);
            y -= x >> i;
            x = nx;
            z += a;
        }
    }

    if flip {
        x = -x;
        y = -y;
    }

    // Q30 down to the scalar's Q16.
    (SimScalar::from_bits(y >> 14), SimScalar::from_bits(x >> 14))
}

pub fn sin(a: SimAngle) -> SimScalar {
    cordic_sin_cos(a).0
}

pub fn cos(a: SimAngle) -> SimScalar {
    cordic_sin_cos(a).1
}

/// Angle whose sine component is `a` and cosine component is `b`; with the
/// +Z-is-zero convention this is the heading of the displacement `(a, b)`
/// read as (x, z).
pub fn atan2(a: SimScalar, b: SimScalar) -> SimAngle {
    let mut x = b.to_bits();
    let mut y = a.to_bits();
    if x == 0 && y == 0 {
        return SimAngle(0);
    }

    // Normalise the vector into [2^28, 2^30) so the iteration keeps maximum
    // precision without overflowing.
    let mut m = x.unsigned_abs().max(y.unsigned_abs());
    while m < 1 << 28 {
        x <<= 1;
        y <<= 1;
        m <<= 1;
    }
    while m >= 1 << 30 {
        x >>= 1;
        y >>= 1;
        m >>= 1;
    }

    let mut z: i64 = 0;
    if x < 0 {
        x = -x;
        y = -y;
        z = HALF_TURN_Q32;
    }

    for (i, &a) in CORDIC_ATAN.iter().enumerate() {
        if y > 0 {
            let nx = x + (y >> i);
            y -= x >> i;
            x = nx;
            z += a;
        } else {
            let nx = x - (y >> i);
            y += x >> i;
            x = nx;
            z -= a;
        }
    }

    SimAngle(((z + (1 << 15)) >> 16) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_math::scalar;

    #[test]
    fn negation_wraps() {
        assert_eq!(-SimAngle(0), SimAngle(0));
        assert_eq!(-SimAngle(65535), SimAngle(1));
    }

    #[test]
    fn angle_between_returns_smallest_difference() {
        assert_eq!(angle_between(SimAngle(100), SimAngle(150)), SimAngle(50));
        assert_eq!(angle_between(SimAngle(100), SimAngle(300)), SimAngle(200));
        assert_eq!(angle_between(SimAngle(1), SimAngle(0)), SimAngle(1));
        // across the discontinuity
        assert_eq!(angle_between(SimAngle(65530), SimAngle(5)), SimAngle(11));
    }

    #[test]
    fn angle_between_is_symmetric_and_bounded() {
        let samples = [0u16, 1, 99, 16384, 32767, 32768, 40000, 65535];
        for &a in &samples {
            for &b in &samples {
                let d = angle_between(SimAngle(a), SimAngle(b));
                assert_eq!(d, angle_between(SimAngle(b), SimAngle(a)));
                assert!(d.0 <= HALF_TURN.0);
            }
            assert_eq!(angle_between(SimAngle(a), SimAngle(a)), SimAngle(0));
        }
    }

    #[test]
    fn direction_flips_with_argument_order() {
        assert_eq!(
            angle_between_with_direction(SimAngle(100), SimAngle(150)),
            (true, SimAngle(50))
        );
        assert_eq!(
            angle_between_with_direction(SimAngle(65530), SimAngle(5)),
            (true, SimAngle(11))
        );
    }

    #[test]
    fn turn_towards_reaches_target_within_step() {
        assert_eq!(
            turn_towards(SimAngle(100), SimAngle(200), SimAngle(150)),
            SimAngle(200)
        );
        assert_eq!(
            turn_towards(SimAngle(100), SimAngle(200), SimAngle(100)),
            SimAngle(200)
        );
        assert_eq!(
            turn_towards(SimAngle(200), SimAngle(100), SimAngle(150)),
            SimAngle(100)
        );
    }

    #[test]
    fn turn_towards_advances_by_step_otherwise() {
        assert_eq!(
            turn_towards(SimAngle(100), SimAngle(200), SimAngle(25)),
            SimAngle(125)
        );
        assert_eq!(
            turn_towards(SimAngle(200), SimAngle(100), SimAngle(25)),
            SimAngle(175)
        );
        // across the discontinuity
        assert_eq!(
            turn_towards(SimAngle(65530), SimAngle(20), SimAngle(9)),
            SimAngle(3)
        );
        assert_eq!(
            turn_towards(SimAngle(20), SimAngle(65530), SimAngle(9)),
            SimAngle(11)
        );
    }

    #[test]
    fn cardinal_angles_are_exact() {
        assert_eq!(sin(SimAngle(0)), SimScalar::ZERO);
        assert_eq!(cos(SimAngle(0)), SimScalar::ONE);
        assert_eq!(sin(QUARTER_TURN), SimScalar::ONE);
        assert_eq!(cos(QUARTER_TURN), SimScalar::ZERO);
        assert_eq!(cos(HALF_TURN), -SimScalar::ONE);
        assert_eq!(sin(SimAngle(0xC000)), -SimScalar::ONE);
    }

    #[test]
    fn eighth_turn_trig_matches_sqrt_half() {
        let sqrt_half = SimScalar::from_num(0.70710678);
        let tolerance = SimScalar::from_bits(4);
        assert!(crate::fixed_math::abs(sin(EIGHTH_TURN) - sqrt_half) < tolerance);
        assert!(crate::fixed_math::abs(cos(EIGHTH_TURN) - sqrt_half) < tolerance);
    }

    #[test]
    fn sin_cos_stay_on_the_unit_circle() {
        for a in (0..=u16::MAX).step_by(977) {
            let (s, c) = (sin(SimAngle(a)), cos(SimAngle(a)));
            let len = s * s + c * c;
            let err = crate::fixed_math::abs(len - SimScalar::ONE);
            assert!(err < SimScalar::from_num(0.001), "angle {a}: len {len}");
        }
    }

    #[test]
    fn atan2_inverts_sin_cos() {
        for a in (0..=u16::MAX).step_by(509) {
            let angle = SimAngle(a);
            let recovered = atan2(sin(angle), cos(angle));
            let err = angle_between(angle, recovered);
            assert!(err.0 <= 2, "angle {a} recovered as {}", recovered.0);
        }
    }

    #[test]
    fn atan2_of_axes() {
        assert_eq!(atan2(SimScalar::ZERO, scalar(1)), SimAngle(0));
        assert_eq!(atan2(scalar(1), SimScalar::ZERO), QUARTER_TURN);
        let back = atan2(SimScalar::ZERO, scalar(-1));
        assert!(angle_between(back, HALF_TURN).0 <= 1);
    }
}
