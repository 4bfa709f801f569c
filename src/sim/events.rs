use crate::fixed_math::SimVector;
use crate::ids::UnitId;

/// Side effects raised by one tick, drained by the embedding engine after
/// the tick returns. Routing them as data instead of callbacks keeps
/// re-entry into the simulation impossible by construction.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    /// An explosion animation; the media layer resolves the animation name
    /// to its sprite archive.
    Explosion {
        anim_name: String,
        position: SimVector,
    },
    Particle {
        spec: String,
        position: SimVector,
        velocity: SimVector,
    },
    PieceExplosion {
        position: SimVector,
        velocity: SimVector,
        destruction_flags: i32,
    },
    /// A unit script asked for a piece-local effect (sound or particle,
    /// resolved by the media layer).
    UnitSfx {
        unit: UnitId,
        piece: usize,
        sfx_type: i32,
        position: SimVector,
    },
    WeaponFired {
        weapon_type: String,
        position: SimVector,
    },
    ProjectileImpact {
        weapon_type: String,
        position: SimVector,
    },
    UnitDied {
        unit: UnitId,
        position: SimVector,
    },
    UnitFinished {
        unit: UnitId,
    },
}
