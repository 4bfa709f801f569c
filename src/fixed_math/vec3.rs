use serde::{Deserialize, Serialize};

use super::SimScalar;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimVector {
    pub x: SimScalar,
    pub y: SimScalar,
    pub z: SimScalar,
}

impl SimVector {
    pub const ZERO: Self = Self {
        x: SimScalar::ZERO,
        y: SimScalar::ZERO,
        z: SimScalar::ZERO,
    };

    pub fn new(x: SimScalar, y: SimScalar, z: SimScalar) -> Self {
        Self { x, y, z }
    }

    pub fn from_f32(x: f32, y: f32, z: f32) -> Self {
        Self {
            x: SimScalar::from_num(x),
            y: SimScalar::from_num(y),
            z: SimScalar::from_num(z),
        }
    }

    pub fn length(self) -> SimScalar {
        let len_sq = self.length_squared();
        if len_sq == SimScalar::ZERO {
            return SimScalar::ZERO;
        }
        len_sq.sqrt()
    }

    pub fn length_squared(self) -> SimScalar {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Length of the projection onto the ground plane.
    pub fn horizontal_length(self) -> SimScalar {
        super::hypot(self.x, self.z)
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == SimScalar::ZERO {
            Self::ZERO
        } else {
            Self {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        }
    }

    pub fn dot(self, other: Self) -> SimScalar {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn distance_squared(self, other: Self) -> SimScalar {
        (other - self).length_squared()
    }

    pub fn distance(self, other: Self) -> SimScalar {
        (other - self).length()
    }
}

impl std::ops::Add for SimVector {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl std::ops::AddAssign for SimVector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for SimVector {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl std::ops::Mul<SimScalar> for SimVector {
    type Output = Self;
    fn mul(self, rhs: SimScalar) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
            z: self.z * rhs,
        }
    }
}

impl std::ops::Div<SimScalar> for SimVector {
    type Output = Self;
    fn div(self, rhs: SimScalar) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
            z: self.z / rhs,
        }
    }
}

impl std::ops::Neg for SimVector {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_math::scalar;

    #[test]
    fn length_and_normalize() {
        let v = SimVector::new(scalar(3), scalar(0), scalar(4));
        assert_eq!(v.length(), scalar(5));
        let n = v.normalize();
        assert!(crate::fixed_math::abs(n.length() - scalar(1)) < SimScalar::from_num(0.001));
    }

    #[test]
    fn zero_normalizes_to_zero() {
        assert_eq!(SimVector::ZERO.normalize(), SimVector::ZERO);
    }

    #[test]
    fn horizontal_length_ignores_height() {
        let v = SimVector::new(scalar(3), scalar(100), scalar(4));
        assert_eq!(v.horizontal_length(), scalar(5));
    }
}
