use rustc_hash::FxHashMap;

use crate::data::{ProjectileRenderType, DEFAULT_DAMAGE_KEY};
use crate::fixed_math::{SimScalar, SimVector};
use crate::ids::{GameTime, PlayerId};

/// Downward acceleration applied to ballistic projectiles, world units per
/// tick squared.
pub fn gravity() -> SimScalar {
    SimScalar::from_num(112) / SimScalar::from_num(900)
}

#[derive(Clone, Debug)]
pub struct Projectile {
    pub weapon_type: String,
    pub owner: PlayerId,

    pub position: SimVector,
    pub previous_position: SimVector,
    /// Where the projectile was fired from.
    pub origin: SimVector,
    /// World units per tick.
    pub velocity: SimVector,

    pub gravity: bool,

    pub render_type: ProjectileRenderType,

    /// Creates smoke on impact.
    pub end_smoke: bool,
    /// Ticks between in-flight smoke emissions; 0 is every tick.
    pub smoke_trail: Option<u32>,
    pub last_smoke: GameTime,

    pub damage: FxHashMap<String, u32>,
    pub damage_radius: SimScalar,

    /// Expires without further travel at this tick.
    pub die_on_frame: Option<GameTime>,

    pub spawned_at: GameTime,

    pub is_dead: bool,
}

impl Projectile {
    /// Damage dealt to a unit type, falling back to the DEFAULT entry. The
    /// load-time check guarantees the fallback exists.
    pub fn get_damage(&self, unit_type: &str) -> u32 {
        self.damage
            .get(unit_type)
            .or_else(|| self.damage.get(DEFAULT_DAMAGE_KEY))
            .copied()
            .unwrap_or_else(|| panic!("projectile damage table has no entry for {unit_type}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_math::scalar;

    fn projectile_with(damage: &[(&str, u32)]) -> Projectile {
        Projectile {
            weapon_type: "CANNON".into(),
            owner: PlayerId(0),
            position: SimVector::ZERO,
            previous_position: SimVector::ZERO,
            origin: SimVector::ZERO,
            velocity: SimVector::ZERO,
            gravity: false,
            render_type: ProjectileRenderType::Laser { duration: scalar(2) },
            end_smoke: false,
            smoke_trail: None,
            last_smoke: GameTime(0),
            damage: damage.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            damage_radius: scalar(10),
            die_on_frame: None,
            spawned_at: GameTime(0),
            is_dead: false,
        }
    }

    #[test]
    fn damage_lookup_prefers_specific_entry() {
        let p = projectile_with(&[("DEFAULT", 100), ("TANK", 40)]);
        assert_eq!(p.get_damage("TANK"), 40);
        assert_eq!(p.get_damage("SUB"), 100);
    }
}
