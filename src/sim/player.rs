use crate::fixed_math::SimScalar;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerStatus {
    Alive,
    Defeated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerType {
    Human,
    Remote,
}

/// Per-player slot: identity plus the economy ledger.
#[derive(Clone, Debug)]
pub struct GamePlayerInfo {
    pub player_type: PlayerType,
    /// Team color index; the renderer resolves it to a palette.
    pub color: u8,
    pub status: PlayerStatus,
    pub side: String,

    pub metal: SimScalar,
    pub max_metal: SimScalar,
    pub energy: SimScalar,
    pub max_energy: SimScalar,

    pub metal_stalled: bool,
    pub energy_stalled: bool,

    /// What the player's units wanted to spend this tick.
    pub desired_metal_consumption: SimScalar,
    pub desired_energy_consumption: SimScalar,
    pub previous_desired_metal_consumption: SimScalar,
    pub previous_desired_energy_consumption: SimScalar,
    /// What they were actually granted.
    pub actual_metal_consumption: SimScalar,
    pub actual_energy_consumption: SimScalar,
    pub metal_production: SimScalar,
    pub energy_production: SimScalar,
}

impl GamePlayerInfo {
    pub fn new(player_type: PlayerType, color: u8, side: &str) -> Self {
        Self {
            player_type,
            color,
            status: PlayerStatus::Alive,
            side: side.to_string(),
            metal: SimScalar::from_num(1000),
            max_metal: SimScalar::from_num(1000),
            energy: SimScalar::from_num(1000),
            max_energy: SimScalar::from_num(1000),
            metal_stalled: false,
            energy_stalled: false,
            desired_metal_consumption: SimScalar::ZERO,
            desired_energy_consumption: SimScalar::ZERO,
            previous_desired_metal_consumption: SimScalar::ZERO,
            previous_desired_energy_consumption: SimScalar::ZERO,
            actual_metal_consumption: SimScalar::ZERO,
            actual_energy_consumption: SimScalar::ZERO,
            metal_production: SimScalar::ZERO,
            energy_production: SimScalar::ZERO,
        }
    }
}
