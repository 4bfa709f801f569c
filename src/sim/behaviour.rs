//! Command application and the per-unit behaviour state machine.

use tracing::{debug, warn};

use crate::commands::{
    FireOrders, IssueKind, PlayerCommand, ReclaimTarget, UnitCommand, UnitOrder,
};
use crate::data::GameDatabase;
use crate::fixed_math::{atan2, cos, sin, turn_towards, SimAngle, SimScalar, SimVector};
use crate::ids::{PlayerId, UnitId, TICKS_PER_SECOND};
use crate::pathfinding::PathDestination;
use crate::terrain::CELL_WORLD_SIZE;

use super::unit::{
    CreatingUnitState, MovingState, NavigationGoal, UnitBehavior, UnitCreationStatus, WeaponState,
};
use super::{GameSimulation, SimEvent, SimulationContext};

fn cell_scalar() -> SimScalar {
    SimScalar::from_num(CELL_WORLD_SIZE)
}

// ---------------------------------------------------------------------------
// Command application
// ---------------------------------------------------------------------------

pub fn apply_player_command(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    player: PlayerId,
    command: &PlayerCommand,
) {
    match command {
        PlayerCommand::PauseGame => sim.paused = true,
        PlayerCommand::UnpauseGame => sim.paused = false,
        PlayerCommand::UnitCommand(unit_command) => {
            let Some(unit) = sim.units.try_get(unit_command.unit) else {
                warn!(unit = unit_command.unit.0, "command for unknown unit");
                return;
            };
            if unit.owner != player {
                warn!(
                    unit = unit_command.unit.0,
                    player = player.0,
                    "command for another player's unit"
                );
                return;
            }
            if !unit.is_alive() {
                return;
            }
            apply_unit_command(sim, ctx, unit_command.unit, &unit_command.command);
        }
    }
}

fn apply_unit_command(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    command: &UnitCommand,
) {
    match command {
        UnitCommand::IssueOrder { order, kind } => {
            let def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
            let is_factory = def.builder && !def.is_mobile();
            if let (true, UnitOrder::Build { unit_type, .. }) = (is_factory, order) {
                enqueue_factory_build(sim, unit_id, unit_type);
                return;
            }
            match kind {
                IssueKind::Immediate => {
                    stop_current_activity(sim, ctx, unit_id);
                    let unit = sim.units.get_mut(unit_id);
                    unit.order_queue.clear();
                    start_order(sim, ctx, unit_id, order.clone());
                }
                IssueKind::Queued => {
                    sim.units.get_mut(unit_id).order_queue.push_back(order.clone());
                }
            }
        }
        UnitCommand::Stop => {
            stop_current_activity(sim, ctx, unit_id);
            let unit = sim.units.get_mut(unit_id);
            unit.order_queue.clear();
            unit.build_queue.clear();
            for weapon in unit.weapons.iter_mut().flatten() {
                weapon.state = WeaponState::Idle;
            }
        }
        UnitCommand::SetFireOrders(orders) => {
            let unit = sim.units.get_mut(unit_id);
            unit.fire_orders = *orders;
            if *orders == FireOrders::HoldFire {
                for weapon in unit.weapons.iter_mut().flatten() {
                    weapon.state = WeaponState::Idle;
                }
            }
        }
        UnitCommand::SetOnOff(on) => {
            let def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
            if !def.on_offable {
                return;
            }
            let script = ctx.db.script(&sim.units.get(unit_id).unit_type);
            let entry = if *on { "Activate" } else { "Deactivate" };
            let unit = sim.units.get_mut(unit_id);
            unit.activated = *on;
            let _ = unit.cob_env.start_thread_by_name(script, entry, vec![]);
        }
    }
}

fn enqueue_factory_build(sim: &mut GameSimulation, unit_id: UnitId, unit_type: &str) {
    let unit = sim.units.get_mut(unit_id);
    // Contiguous runs of the same type are merged.
    if let Some(back) = unit.build_queue.back_mut() {
        if back.0 == unit_type {
            back.1 += 1;
            return;
        }
    }
    unit.build_queue.push_back((unit_type.to_string(), 1));
}

/// Cancels the current behaviour, dropping any in-flight path request so a
/// stale result cannot land later.
fn stop_current_activity(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId) {
    let unit = sim.units.get_mut(unit_id);
    if let UnitBehavior::Moving(ms) = &unit.behaviour_state {
        if let Some(task) = ms.path_requested {
            ctx.path_service.cancel(task);
        }
    }
    unit.behaviour_state = UnitBehavior::Idle;
    unit.clear_movement();
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn build_distance_of(db: &GameDatabase, sim: &GameSimulation, unit_id: UnitId) -> SimScalar {
    let def = db.unit_definition(&sim.units.get(unit_id).unit_type);
    SimScalar::from_num(def.build_distance.max(CELL_WORLD_SIZE as u32))
}

fn horizontal_distance(a: SimVector, b: SimVector) -> SimScalar {
    (b - a).horizontal_length()
}

/// Moves toward the order's work site after putting the order back at the
/// queue front; when the walk finishes the order starts again, in range.
fn approach_then_retry(
    sim: &mut GameSimulation,
    unit_id: UnitId,
    order: UnitOrder,
    goal: NavigationGoal,
) {
    let unit = sim.units.get_mut(unit_id);
    unit.order_queue.push_front(order);
    unit.behaviour_state = UnitBehavior::Moving(MovingState::new(goal));
}

fn start_order(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    order: UnitOrder,
) {
    match order {
        UnitOrder::Move(destination) => {
            sim.units.get_mut(unit_id).behaviour_state =
                UnitBehavior::Moving(MovingState::new(NavigationGoal::Point(destination)));
        }
        UnitOrder::Attack(target) => {
            super::weapons::issue_attack_order(sim, ctx, unit_id, target);
        }
        UnitOrder::Build {
            unit_type,
            position,
        } => {
            let Some(target_def) = ctx.db.try_unit_definition(&unit_type) else {
                warn!(unit_type, "build order for unknown unit type");
                return;
            };
            let site =
                GameSimulation::footprint_region(position, target_def.footprint_x, target_def.footprint_z);
            let in_range = horizontal_distance(sim.units.get(unit_id).position, position)
                <= build_distance_of(ctx.db, sim, unit_id);
            if in_range {
                sim.units.get_mut(unit_id).behaviour_state =
                    UnitBehavior::CreatingUnit(CreatingUnitState {
                        unit_type,
                        position,
                        status: UnitCreationStatus::Pending,
                    });
            } else {
                approach_then_retry(
                    sim,
                    unit_id,
                    UnitOrder::Build {
                        unit_type,
                        position,
                    },
                    NavigationGoal::NearRect(site),
                );
            }
        }
        UnitOrder::CompleteBuild(target) => {
            if !sim.units.contains(target) {
                return;
            }
            let target_position = sim.units.get(target).position;
            let in_range = horizontal_distance(sim.units.get(unit_id).position, target_position)
                <= build_distance_of(ctx.db, sim, unit_id);
            if in_range {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Building(target);
            } else {
                let rect = sim.unit_footprint(ctx.db, target);
                approach_then_retry(
                    sim,
                    unit_id,
                    UnitOrder::CompleteBuild(target),
                    NavigationGoal::NearRect(rect),
                );
            }
        }
        UnitOrder::Guard(target) => {
            sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Guarding(target);
        }
        UnitOrder::Reclaim(target) => {
            let target_position = match target {
                ReclaimTarget::Unit(u) => sim.units.try_get(u).map(|u| u.position),
                ReclaimTarget::Feature(f) => sim.features.try_get(f).map(|f| f.position),
            };
            let Some(target_position) = target_position else {
                return;
            };
            let in_range = horizontal_distance(sim.units.get(unit_id).position, target_position)
                <= build_distance_of(ctx.db, sim, unit_id);
            if in_range {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Reclaiming(target);
            } else {
                let goal = NavigationGoal::Point(target_position);
                approach_then_retry(sim, unit_id, UnitOrder::Reclaim(target), goal);
            }
        }
        UnitOrder::BuggerOff(rect) => {
            // Step out of the rectangle: walk away from its centre. A unit
            // standing exactly on the centre (fresh out of a factory)
            // leaves through the south side.
            let unit = sim.units.get(unit_id);
            let center = sim.terrain.footprint_center_to_world(
                rect.top_left(),
                rect.width,
                rect.height,
            );
            let mut away = (unit.position - center).normalize();
            if away == SimVector::ZERO {
                away = SimVector::new(SimScalar::ZERO, SimScalar::ZERO, SimScalar::ONE);
            }
            let clearance = cell_scalar()
                * SimScalar::from_num((rect.width.max(rect.height) + 2) as i64);
            let destination = unit.position + away * clearance;
            sim.units.get_mut(unit_id).behaviour_state =
                UnitBehavior::Moving(MovingState::new(NavigationGoal::Point(destination)));
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour update, one unit per call
// ---------------------------------------------------------------------------

pub fn update_unit_behaviour(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
) {
    let Some(unit) = sim.units.try_get(unit_id) else {
        return;
    };
    if !unit.is_alive() || !unit.is_fully_built() {
        return;
    }

    match unit.behaviour_state.clone() {
        UnitBehavior::Idle => update_idle(sim, ctx, unit_id),
        UnitBehavior::Moving(_) => update_moving(sim, ctx, unit_id),
        UnitBehavior::Building(target) => update_building(sim, ctx, unit_id, target),
        UnitBehavior::CreatingUnit(state) => update_creating(sim, ctx, unit_id, state),
        UnitBehavior::Guarding(target) => {
            if !sim.units.contains(target) {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
            }
        }
        UnitBehavior::Reclaiming(target) => update_reclaiming(sim, ctx, unit_id, target),
    }
}

fn update_idle(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId) {
    if let Some(order) = sim.units.get_mut(unit_id).order_queue.pop_front() {
        start_order(sim, ctx, unit_id, order);
        return;
    }

    // Factories pull from the build queue.
    let def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
    if def.builder && !def.is_mobile() {
        let next = sim.units.get(unit_id).build_queue.front().cloned();
        if let Some((unit_type, _)) = next {
            let position = sim.units.get(unit_id).position;
            sim.units.get_mut(unit_id).behaviour_state =
                UnitBehavior::CreatingUnit(CreatingUnitState {
                    unit_type,
                    position,
                    status: UnitCreationStatus::Pending,
                });
        }
    }
}

fn update_moving(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId) {
    let def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
    if !def.can_move || !def.is_mobile() {
        sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
        return;
    }
    let max_velocity = def.max_velocity;
    let acceleration = def.acceleration;
    let brake_rate = def.brake_rate;
    let footprint = (def.footprint_x, def.footprint_z);

    // Request a path if none is underway.
    let needs_request = {
        let unit = sim.units.get(unit_id);
        match &unit.behaviour_state {
            UnitBehavior::Moving(ms) => ms.path.is_none() && ms.path_requested.is_none(),
            _ => unreachable!(),
        }
    };
    if needs_request {
        let destination = {
            let unit = sim.units.get(unit_id);
            let ms = match &unit.behaviour_state {
                UnitBehavior::Moving(ms) => ms,
                _ => unreachable!(),
            };
            match ms.destination {
                NavigationGoal::Point(p) => PathDestination::Cell(
                    GameSimulation::footprint_region(p, footprint.0, footprint.1).top_left(),
                ),
                NavigationGoal::NearRect(rect) => PathDestination::NearRect(rect),
            }
        };
        let task = ctx.path_service.request(unit_id, destination);
        if let Some(ms) = sim.units.get_mut(unit_id).moving_state_mut() {
            ms.path_requested = Some(task);
        }
        return;
    }

    let Some((waypoint, is_last)) = ({
        let unit = sim.units.get(unit_id);
        match &unit.behaviour_state {
            UnitBehavior::Moving(ms) => ms.path.as_ref().map(|p| {
                (
                    p.waypoints[p.current],
                    p.current + 1 == p.waypoints.len(),
                )
            }),
            _ => unreachable!(),
        }
    }) else {
        // Path requested, still queued; stand still this tick.
        return;
    };

    let position = sim.units.get(unit_id).position;
    let to_waypoint = waypoint - position;
    let distance = to_waypoint.horizontal_length();

    let arrival_radius = if is_last {
        cell_scalar() / SimScalar::from_num(4)
    } else {
        cell_scalar() / SimScalar::from_num(2)
    };

    if distance <= arrival_radius {
        let finished = {
            let ms = sim.units.get_mut(unit_id).moving_state_mut().unwrap();
            let path = ms.path.as_mut().unwrap();
            path.current += 1;
            path.current >= path.waypoints.len()
        };
        if finished {
            let unit = sim.units.get_mut(unit_id);
            unit.behaviour_state = UnitBehavior::Idle;
            unit.clear_movement();
            unit.current_speed = SimScalar::ZERO;
            debug!(unit = unit_id.0, "arrived");
        }
        return;
    }

    // Steer: turn toward the waypoint, ramp speed, translate.
    {
        let unit = sim.units.get_mut(unit_id);
        unit.target_angle = atan2(to_waypoint.x, to_waypoint.z);
        unit.rotation = turn_towards(
            unit.rotation,
            unit.target_angle,
            SimAngle::from_scalar(unit.turn_rate),
        );

        unit.target_speed = max_velocity;
        if is_last && brake_rate > SimScalar::ZERO {
            let brake_distance =
                unit.current_speed * unit.current_speed / (SimScalar::from_num(2) * brake_rate);
            if distance <= brake_distance {
                unit.target_speed = SimScalar::ZERO;
            }
        }

        if unit.current_speed < unit.target_speed {
            unit.current_speed = (unit.current_speed + acceleration).min(unit.target_speed);
        } else if unit.current_speed > unit.target_speed {
            unit.current_speed = (unit.current_speed - brake_rate).max(unit.target_speed);
        }
    }

    let unit = sim.units.get(unit_id);
    let heading = unit.rotation;
    let step = SimVector::new(sin(heading), SimScalar::ZERO, cos(heading)) * unit.current_speed;
    let mut candidate = position + step;
    candidate.y = sim.get_ground_height(candidate.x, candidate.z);

    let old_rect = GameSimulation::footprint_region(position, footprint.0, footprint.1);
    let new_rect = GameSimulation::footprint_region(candidate, footprint.0, footprint.1);

    if sim.is_collision_at(&new_rect, Some(unit_id)) {
        // Blocked by something the path didn't know about. Stall and
        // replan from scratch.
        let unit = sim.units.get_mut(unit_id);
        unit.in_collision = true;
        unit.current_speed = SimScalar::ZERO;
        if let Some(ms) = unit.moving_state_mut() {
            if let Some(task) = ms.path_requested.take() {
                ctx.path_service.cancel(task);
            }
            ms.path = None;
        }
        return;
    }

    let unit = sim.units.get_mut(unit_id);
    unit.in_collision = false;
    unit.position = candidate;
    if new_rect != old_rect {
        sim.move_unit_occupation(ctx.db, unit_id, &old_rect);
    }
}

fn update_building(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    target: UnitId,
) {
    if !sim.units.contains(target) || !sim.units.get(target).is_alive() {
        sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
        return;
    }

    if sim.units.get(target).is_fully_built() {
        finish_building(sim, ctx, unit_id, target);
        return;
    }

    let target_position = sim.units.get(target).position;
    let in_range = horizontal_distance(sim.units.get(unit_id).position, target_position)
        <= build_distance_of(ctx.db, sim, unit_id);
    if !in_range {
        let rect = sim.unit_footprint(ctx.db, target);
        approach_then_retry(
            sim,
            unit_id,
            UnitOrder::CompleteBuild(target),
            NavigationGoal::NearRect(rect),
        );
        return;
    }

    // Powered gate comes from last tick's resource accounting.
    if !sim.units.get(unit_id).is_sufficiently_powered {
        return;
    }

    let builder_def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
    let target_def = ctx.db.unit_definition(&sim.units.get(target).unit_type);
    if target_def.build_time == 0 {
        sim.units.get_mut(target).build_time_completed = SimScalar::ONE;
        finish_building(sim, ctx, unit_id, target);
        return;
    }

    // worker_time is build effort per second.
    let delta = SimScalar::from_num(builder_def.worker_time)
        / SimScalar::from_num(TICKS_PER_SECOND)
        / SimScalar::from_num(target_def.build_time);
    let delta = delta.min(SimScalar::ONE - sim.units.get(target).build_time_completed);

    {
        let builder = sim.units.get_mut(unit_id);
        builder.build_metal_this_tick += target_def.build_cost_metal * delta;
        builder.build_energy_this_tick += target_def.build_cost_energy * delta;
    }

    let max_damage = target_def.max_damage;
    let target_unit = sim.units.get_mut(target);
    target_unit.build_time_completed += delta;
    // Hit points grow with progress up to the full amount.
    let expected = (SimScalar::from_num(max_damage) * target_unit.build_time_completed)
        .to_num::<i64>()
        .clamp(1, i64::from(max_damage)) as u32;
    target_unit.hit_points = target_unit.hit_points.max(expected);

    if target_unit.build_time_completed >= SimScalar::ONE {
        target_unit.build_time_completed = SimScalar::ONE;
        finish_building(sim, ctx, unit_id, target);
    }
}

fn finish_building(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    target: UnitId,
) {
    let target_def = ctx.db.unit_definition(&sim.units.get(target).unit_type);
    let activate = target_def.activate_when_built;
    {
        let target_unit = sim.units.get_mut(target);
        target_unit.hit_points = target_unit.max_damage;
        if activate {
            target_unit.activated = true;
        }
    }
    ctx.events.push(SimEvent::UnitFinished { unit: target });

    // Factories consume the finished run entry and shoo the unit out.
    let factory_def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
    if factory_def.builder && !factory_def.is_mobile() {
        let unit = sim.units.get_mut(unit_id);
        if let Some(front) = unit.build_queue.front_mut() {
            if front.1 > 1 {
                front.1 -= 1;
            } else {
                unit.build_queue.pop_front();
            }
        }
        let rect = sim.unit_footprint(ctx.db, unit_id);
        sim.units
            .get_mut(target)
            .order_queue
            .push_back(UnitOrder::BuggerOff(rect));
    }

    sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
}

fn update_creating(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    state: CreatingUnitState,
) {
    let owner = sim.units.get(unit_id).owner;
    match sim.spawn_unit(ctx.db, &state.unit_type, owner, state.position, false) {
        Some(new_unit) => {
            sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Building(new_unit);
        }
        None => {
            // Blocked site. Give up; the order has already been consumed.
            warn!(
                unit = unit_id.0,
                unit_type = state.unit_type,
                "build site blocked, creation failed"
            );
            let unit = sim.units.get_mut(unit_id);
            unit.behaviour_state = UnitBehavior::Idle;
            // Factories drop the queue entry so they do not retry forever.
            if let Some(front) = unit.build_queue.front_mut() {
                if front.1 > 1 {
                    front.1 -= 1;
                } else {
                    unit.build_queue.pop_front();
                }
            }
        }
    }
}

fn update_reclaiming(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    target: ReclaimTarget,
) {
    let builder_def = ctx.db.unit_definition(&sim.units.get(unit_id).unit_type);
    let worker = SimScalar::from_num(builder_def.worker_time) / SimScalar::from_num(TICKS_PER_SECOND);

    match target {
        ReclaimTarget::Feature(feature_id) => {
            let Some(feature) = sim.features.try_get(feature_id) else {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
                return;
            };
            let def = ctx.db.feature_definition(&feature.feature_type);
            if !def.reclaimable {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
                return;
            }
            let effort = SimScalar::from_num(def.damage.max(1));
            let metal = def.metal;
            let energy = def.energy;
            let done = {
                let feature = sim.features.get_mut(feature_id);
                feature.reclaim_progress += worker / effort;
                feature.reclaim_progress >= SimScalar::ONE
            };
            if done {
                sim.remove_feature(ctx.db, feature_id);
                let owner = sim.units.get(unit_id).owner;
                let player = sim.player_mut(owner);
                player.metal = (player.metal + metal).min(player.max_metal);
                player.energy = (player.energy + energy).min(player.max_energy);
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
            }
        }
        ReclaimTarget::Unit(target_id) => {
            let Some(target_unit) = sim.units.try_get(target_id) else {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
                return;
            };
            if !target_unit.is_alive() {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
                return;
            }
            let target_def = ctx.db.unit_definition(&target_unit.unit_type);
            let chunk = worker.to_num::<i64>().max(1) as u32;
            let metal_value = target_def.build_cost_metal;
            let max_damage = target_def.max_damage.max(1);
            let hp_before = target_unit.hit_points;
            let killed = {
                let target_unit = sim.units.get_mut(target_id);
                target_unit.damage(chunk, Some(unit_id));
                !target_unit.is_alive()
            };
            // Metal is credited in proportion to the hit points chewed off.
            let chewed = hp_before - sim.units.get(target_id).hit_points;
            let share =
                metal_value * SimScalar::from_num(chewed) / SimScalar::from_num(max_damage);
            let owner = sim.units.get(unit_id).owner;
            let player = sim.player_mut(owner);
            player.metal = (player.metal + share).min(player.max_metal);
            if killed {
                sim.units.get_mut(unit_id).behaviour_state = UnitBehavior::Idle;
            }
        }
    }
}
