//! Per-player resource accounting.
//!
//! Production is summed over units first, then consumption is granted in
//! unit id order until the budget runs out; units that miss out have their
//! `is_sufficiently_powered` flag cleared for the next tick. The order is
//! deterministic, so every peer stalls the same units.

use crate::fixed_math::SimScalar;
use crate::ids::PlayerId;

use super::{GameSimulation, SimulationContext};

pub fn run_resource_tick(sim: &mut GameSimulation, ctx: &mut SimulationContext) {
    // First pass: refresh each unit's per-tick flows from its definition
    // and the build work accumulated this tick.
    let unit_ids = sim.units.ids();
    for &id in &unit_ids {
        let def = ctx.db.unit_definition(&sim.units.get(id).unit_type);
        let metal_make = def.metal_make;
        let energy_make = def.energy_make;
        let metal_use = def.metal_use;
        let energy_use = def.energy_use;
        let unit = sim.units.get_mut(id);

        unit.previous_metal_use = unit.metal_use;
        unit.previous_energy_use = unit.energy_use;

        let producing = unit.is_alive() && unit.is_fully_built() && unit.activated;
        unit.metal_make = if producing { metal_make } else { SimScalar::ZERO };
        unit.energy_make = if producing { energy_make } else { SimScalar::ZERO };

        let consuming = unit.is_alive() && unit.is_fully_built();
        unit.metal_use = if consuming && unit.activated {
            metal_use
        } else {
            SimScalar::ZERO
        };
        unit.energy_use = if consuming && unit.activated {
            energy_use
        } else {
            SimScalar::ZERO
        };
        unit.metal_use += unit.build_metal_this_tick;
        unit.energy_use += unit.build_energy_this_tick;
        unit.build_metal_this_tick = SimScalar::ZERO;
        unit.build_energy_this_tick = SimScalar::ZERO;
    }

    for slot in 0..super::MAX_PLAYERS {
        let player_id = PlayerId(slot as u32);
        if sim.players[slot].is_none() {
            continue;
        }
        run_player_resource_tick(sim, player_id, &unit_ids);
    }
}

fn run_player_resource_tick(
    sim: &mut GameSimulation,
    player_id: PlayerId,
    unit_ids: &[crate::ids::UnitId],
) {
    let mut metal_production = SimScalar::ZERO;
    let mut energy_production = SimScalar::ZERO;
    let mut desired_metal = SimScalar::ZERO;
    let mut desired_energy = SimScalar::ZERO;

    for &id in unit_ids {
        let Some(unit) = sim.units.try_get(id) else {
            continue;
        };
        if unit.owner != player_id {
            continue;
        }
        metal_production += unit.metal_make;
        energy_production += unit.energy_make;
        desired_metal += unit.metal_use;
        desired_energy += unit.energy_use;
    }

    let (mut metal_budget, mut energy_budget) = {
        let player = sim.player(player_id);
        (
            player.metal + metal_production,
            player.energy + energy_production,
        )
    };

    let metal_stalled = desired_metal > metal_budget;
    let energy_stalled = desired_energy > energy_budget;

    let mut actual_metal = SimScalar::ZERO;
    let mut actual_energy = SimScalar::ZERO;

    // Grant consumption in id order; a unit is powered only if both of its
    // demands fit what is left.
    for &id in unit_ids {
        let Some(unit) = sim.units.try_get(id) else {
            continue;
        };
        if unit.owner != player_id {
            continue;
        }
        let wants_metal = unit.metal_use;
        let wants_energy = unit.energy_use;
        let granted = wants_metal <= metal_budget && wants_energy <= energy_budget;
        if granted {
            metal_budget -= wants_metal;
            energy_budget -= wants_energy;
            actual_metal += wants_metal;
            actual_energy += wants_energy;
        }
        sim.units.get_mut(id).is_sufficiently_powered = granted;
    }

    let player = sim.player_mut(player_id);
    player.previous_desired_metal_consumption = player.desired_metal_consumption;
    player.previous_desired_energy_consumption = player.desired_energy_consumption;
    player.desired_metal_consumption = desired_metal;
    player.desired_energy_consumption = desired_energy;
    player.actual_metal_consumption = actual_metal;
    player.actual_energy_consumption = actual_energy;
    player.metal_production = metal_production;
    player.energy_production = energy_production;
    player.metal_stalled = metal_stalled;
    player.energy_stalled = energy_stalled;
    player.metal = metal_budget.clamp(SimScalar::ZERO, player.max_metal);
    player.energy = energy_budget.clamp(SimScalar::ZERO, player.max_energy);
}
