//! Opaque identifiers and counters.
//!
//! Every entity class gets its own id newtype so a unit id can never be
//! handed to a projectile lookup by accident. Ids wrap a dense index and
//! are never reused within a game.

use serde::{Deserialize, Serialize};

/// Conversion between an id and the dense index it wraps. Implemented by
/// every id newtype so [`crate::collections::VecMap`] can be keyed by any
/// of them.
pub trait DenseId: Copy {
    fn index(self) -> usize;
    fn from_index(index: usize) -> Self;
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl DenseId for $name {
            fn index(self) -> usize {
                self.0 as usize
            }

            fn from_index(index: usize) -> Self {
                $name(index as u32)
            }
        }
    };
}

opaque_id!(UnitId);
opaque_id!(ProjectileId);
opaque_id!(FeatureId);
opaque_id!(
    /// Player slot index, 0-based. At most [`crate::sim::MAX_PLAYERS`] players.
    PlayerId
);
opaque_id!(MovementClassId);
opaque_id!(
    /// Identifies one outstanding pathfinding request so that a stale result
    /// can be recognised and dropped.
    PathTaskId
);

/// Monotonic simulation tick counter. One tick is 1/30 of a second.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GameTime(pub u32);

/// Number of simulation ticks per second.
pub const TICKS_PER_SECOND: u32 = 30;

impl GameTime {
    pub fn next(self) -> GameTime {
        GameTime(self.0 + 1)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GameTimeDelta(pub u32);

impl GameTimeDelta {
    /// Ticks covering at least `ms` milliseconds of game time.
    pub fn from_milliseconds(ms: u32) -> GameTimeDelta {
        GameTimeDelta((ms * TICKS_PER_SECOND).div_ceil(1000))
    }
}

impl std::ops::Add<GameTimeDelta> for GameTime {
    type Output = GameTime;
    fn add(self, rhs: GameTimeDelta) -> GameTime {
        GameTime(self.0 + rhs.0)
    }
}

impl std::ops::Sub for GameTime {
    type Output = GameTimeDelta;
    fn sub(self, rhs: GameTime) -> GameTimeDelta {
        GameTimeDelta(self.0 - rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_conversion_rounds_up() {
        assert_eq!(GameTimeDelta::from_milliseconds(500), GameTimeDelta(15));
        assert_eq!(GameTimeDelta::from_milliseconds(1000), GameTimeDelta(30));
        assert_eq!(GameTimeDelta::from_milliseconds(1), GameTimeDelta(1));
        assert_eq!(GameTimeDelta::from_milliseconds(0), GameTimeDelta(0));
        assert_eq!(GameTimeDelta::from_milliseconds(34), GameTimeDelta(2));
    }

    #[test]
    fn ids_do_not_compare_across_types() {
        // Compile-time property; this just documents the intent.
        let unit = UnitId(3);
        assert_eq!(unit.index(), 3);
        assert_eq!(UnitId::from_index(3), unit);
    }
}
