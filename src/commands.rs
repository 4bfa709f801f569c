//! Player commands and unit orders.
//!
//! These are the only inputs the lockstep protocol carries; everything a
//! player does is expressed as one of these and applied at an agreed tick
//! on every peer.

use serde::{Deserialize, Serialize};

use crate::collections::DiscreteRect;
use crate::fixed_math::SimVector;
use crate::ids::{FeatureId, UnitId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FireOrders {
    HoldFire,
    ReturnFire,
    #[default]
    FireAtWill,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackTarget {
    Unit(UnitId),
    Ground(SimVector),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReclaimTarget {
    Unit(UnitId),
    Feature(FeatureId),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOrder {
    Move(SimVector),
    Attack(AttackTarget),
    Build {
        unit_type: String,
        position: SimVector,
    },
    /// Finish building an already in-progress unit.
    CompleteBuild(UnitId),
    Guard(UnitId),
    Reclaim(ReclaimTarget),
    /// Clear out of a rectangle, typically a factory exit.
    BuggerOff(DiscreteRect),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Replace the current order queue.
    Immediate,
    /// Append to the queue.
    Queued,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitCommand {
    IssueOrder { order: UnitOrder, kind: IssueKind },
    Stop,
    SetFireOrders(FireOrders),
    SetOnOff(bool),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUnitCommand {
    pub unit: UnitId,
    pub command: UnitCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    UnitCommand(PlayerUnitCommand),
    PauseGame,
    UnpauseGame,
}
