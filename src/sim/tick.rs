//! One simulation tick.
//!
//! The phase order here is a contract: command application, script
//! threads, piece integration, behaviour, weapons, projectiles, resources,
//! dead sweep, time increment. Reordering any two phases changes observable
//! behaviour on every peer at once or not at all, so don't.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::commands::PlayerCommand;
use crate::data::DEFAULT_DAMAGE_KEY;
use crate::fixed_math::{SimScalar, SimVector};
use crate::ids::{PlayerId, ProjectileId, UnitId};
use crate::pathfinding::{simplify_path, UnitPathFinder};

use super::behaviour::{apply_player_command, update_unit_behaviour};
use super::cob_glue::{run_script_query, run_unit_scripts};
use super::economy::run_resource_tick;
use super::projectile::gravity;
use super::unit::{NavigationGoal, UnitBehavior};
use super::weapons::update_unit_weapons;
use super::{GameSimulation, SimEvent, SimulationContext};

/// Advances the world by one tick, applying `commands` first. Commands
/// arrive as one list per player from the lockstep service, already in
/// registration order.
pub fn tick(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    commands: &[(PlayerId, Vec<PlayerCommand>)],
) {
    for (player, list) in commands {
        for command in list {
            apply_player_command(sim, ctx, *player, command);
        }
    }

    if !sim.paused {
        let unit_ids = sim.units.ids();

        // Cache previous body state for render interpolation.
        for &id in &unit_ids {
            let unit = sim.units.get_mut(id);
            unit.previous_position = unit.position;
            unit.previous_rotation = unit.rotation;
        }

        for &id in &unit_ids {
            run_unit_scripts(sim, ctx, id);
        }

        let dt = SimScalar::ONE;
        for &id in &unit_ids {
            for piece in &mut sim.units.get_mut(id).pieces {
                piece.update(dt);
            }
        }

        deliver_paths(sim, ctx);
        for &id in &unit_ids {
            update_unit_behaviour(sim, ctx, id);
        }

        for &id in &unit_ids {
            update_unit_weapons(sim, ctx, id);
        }

        update_projectiles(sim, ctx);

        run_resource_tick(sim, ctx);

        sweep_dead(sim, ctx);
    }

    sim.game_time = sim.game_time.next();
}

// ---------------------------------------------------------------------------
// Pathfinding delivery
// ---------------------------------------------------------------------------

/// Computes this tick's budget of queued path searches and hands results to
/// the units that still want them. A unit that changed its mind no longer
/// carries the task id and the result is dropped.
fn deliver_paths(sim: &mut GameSimulation, ctx: &mut SimulationContext) {
    for request in ctx.path_service.take_batch() {
        let Some(unit) = sim.units.try_get(request.unit) else {
            continue;
        };
        let still_wanted = matches!(
            &unit.behaviour_state,
            UnitBehavior::Moving(ms) if ms.path_requested == Some(request.task)
        );
        if !still_wanted {
            debug!(unit = request.unit.0, task = request.task.0, "dropping stale path result");
            continue;
        }

        let def = ctx.db.unit_definition(&unit.unit_type);
        let footprint = (def.footprint_x, def.footprint_z);
        let movement_class = ctx.db.movement_class_id(&unit.unit_type);
        let destination_point = match &unit.behaviour_state {
            UnitBehavior::Moving(ms) => match ms.destination {
                NavigationGoal::Point(p) => Some(p),
                NavigationGoal::NearRect(_) => None,
            },
            _ => None,
        };

        let start = sim.unit_footprint(ctx.db, request.unit).top_left();
        let result = {
            let view = sim.path_view(movement_class, request.unit);
            UnitPathFinder::new(&view, footprint.0, footprint.1, request.destination).find(start)
        };

        if !result.reached_goal && result.path.len() <= 1 {
            // Nowhere to go at all; the move order fizzles.
            let unit = sim.units.get_mut(request.unit);
            unit.behaviour_state = UnitBehavior::Idle;
            unit.clear_movement();
            continue;
        }

        let cells = simplify_path(&result.path);
        let mut waypoints: Vec<SimVector> = cells
            .iter()
            .map(|c| {
                sim.terrain
                    .footprint_center_to_world(*c, footprint.0, footprint.1)
            })
            .collect();
        // An exact point goal ends at the ordered spot, not the cell centre.
        if result.reached_goal {
            if let Some(p) = destination_point {
                if let Some(last) = waypoints.last_mut() {
                    *last = p;
                }
            }
        }

        let unit = sim.units.get_mut(request.unit);
        if let Some(ms) = unit.moving_state_mut() {
            ms.path_requested = None;
            ms.path = Some(super::unit::PathFollowState {
                waypoints,
                current: 0,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Projectiles
// ---------------------------------------------------------------------------

fn update_projectiles(sim: &mut GameSimulation, ctx: &mut SimulationContext) {
    let now = sim.game_time;
    let projectile_ids = sim.projectiles.ids();

    for &id in &projectile_ids {
        if sim.projectiles.get(id).is_dead {
            continue;
        }

        // Integrate.
        {
            let p = sim.projectiles.get_mut(id);
            p.previous_position = p.position;
            if p.gravity {
                p.velocity.y -= gravity();
            }
            p.position = p.position + p.velocity;
        }

        // Smoke trail.
        {
            let p = sim.projectiles.get(id);
            if let Some(interval) = p.smoke_trail {
                if (now - p.last_smoke).0 > interval {
                    let position = p.position;
                    sim.projectiles.get_mut(id).last_smoke = now;
                    ctx.events.push(SimEvent::Particle {
                        spec: "smoke".to_string(),
                        position,
                        velocity: SimVector::ZERO,
                    });
                }
            }
        }

        // Timed expiry: the projectile just stops existing.
        if sim.projectiles.get(id).die_on_frame.is_some_and(|t| now >= t) {
            let p = sim.projectiles.get_mut(id);
            p.is_dead = true;
            if p.end_smoke {
                let position = p.position;
                ctx.events.push(SimEvent::Particle {
                    spec: "smoke".to_string(),
                    position,
                    velocity: SimVector::ZERO,
                });
            }
            continue;
        }

        // Terrain and water surface.
        let (position, owner) = {
            let p = sim.projectiles.get(id);
            (p.position, p.owner)
        };
        let ground = sim.get_ground_height(position.x, position.z);
        let surface = ground.max(sim.terrain.sea_level());
        if position.y <= surface {
            let bounces = ctx
                .db
                .weapon_definition(&sim.projectiles.get(id).weapon_type)
                .ground_bounce;
            if bounces {
                let p = sim.projectiles.get_mut(id);
                p.position.y = surface;
                if p.velocity.y < SimScalar::ZERO {
                    p.velocity.y = SimScalar::ZERO;
                }
            } else {
                let mut impact = position;
                impact.y = surface;
                explode_projectile(sim, ctx, id, impact, None);
                continue;
            }
        }

        // Unit bodies.
        let mut hit = None;
        for (unit_id, unit) in sim.units.iter() {
            if !unit.is_alive() {
                continue;
            }
            // Grace period so a shell does not detonate inside its own
            // firing unit's bounding box.
            if unit.owner == owner && (now - sim.projectiles.get(id).spawned_at).0 < 2 {
                continue;
            }
            if sim.point_in_unit_aabb(ctx.db, unit_id, sim.projectiles.get(id).position) {
                hit = Some(unit_id);
                break;
            }
        }
        if hit.is_some() {
            let impact = sim.projectiles.get(id).position;
            explode_projectile(sim, ctx, id, impact, hit);
        }
    }

    // Projectiles that left the world quietly expire.
    for &id in &projectile_ids {
        let p = sim.projectiles.get(id);
        if p.is_dead {
            continue;
        }
        let world_x = SimScalar::from_num(
            (sim.terrain.width_in_cells() as i64) * crate::terrain::CELL_WORLD_SIZE,
        );
        let world_z = SimScalar::from_num(
            (sim.terrain.height_in_cells() as i64) * crate::terrain::CELL_WORLD_SIZE,
        );
        let pos = p.position;
        if pos.x < SimScalar::ZERO || pos.z < SimScalar::ZERO || pos.x > world_x || pos.z > world_z
        {
            sim.projectiles.get_mut(id).is_dead = true;
        }
    }
}

fn explode_projectile(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    id: ProjectileId,
    impact: SimVector,
    direct_hit: Option<UnitId>,
) {
    let (weapon_type, damage, radius) = {
        let p = sim.projectiles.get_mut(id);
        p.is_dead = true;
        p.position = impact;
        (p.weapon_type.clone(), p.damage.clone(), p.damage_radius)
    };

    // The body the projectile struck takes the full table damage; splash
    // falls off around it.
    if let Some(unit_id) = direct_hit {
        let base = {
            let unit = sim.units.get(unit_id);
            damage
                .get(&unit.unit_type)
                .or_else(|| damage.get(DEFAULT_DAMAGE_KEY))
                .copied()
                .unwrap_or(0)
        };
        sim.units.get_mut(unit_id).damage(base, None);
    }

    apply_radial_damage_excluding(sim, ctx, impact, &damage, radius, None, direct_hit);

    ctx.events.push(SimEvent::ProjectileImpact {
        weapon_type: weapon_type.clone(),
        position: impact,
    });
    ctx.events.push(SimEvent::Explosion {
        anim_name: weapon_type,
        position: impact,
    });
}

/// Damages every unit whose bounding volume intersects the blast sphere,
/// scaled linearly from full at the centre to zero at the radius edge.
pub fn apply_radial_damage(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    center: SimVector,
    damage: &FxHashMap<String, u32>,
    radius: SimScalar,
    attacker: Option<UnitId>,
) {
    apply_radial_damage_excluding(sim, ctx, center, damage, radius, attacker, None);
}

fn apply_radial_damage_excluding(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    center: SimVector,
    damage: &FxHashMap<String, u32>,
    radius: SimScalar,
    attacker: Option<UnitId>,
    exclude: Option<UnitId>,
) {
    let unit_ids = sim.units.ids();
    for &unit_id in &unit_ids {
        if Some(unit_id) == exclude {
            continue;
        }
        let unit = sim.units.get(unit_id);
        if !unit.is_alive() {
            continue;
        }
        if !sim.sphere_intersects_unit_aabb(ctx.db, unit_id, center, radius) {
            continue;
        }

        let unit = sim.units.get(unit_id);
        let base = damage
            .get(&unit.unit_type)
            .or_else(|| damage.get(DEFAULT_DAMAGE_KEY))
            .copied()
            .unwrap_or(0);

        let distance = (unit.position - center).length();
        let scaled = if radius <= SimScalar::ZERO {
            base
        } else if distance >= radius {
            0
        } else {
            (SimScalar::from_num(base) * (radius - distance) / radius).to_num::<i64>() as u32
        };

        sim.units.get_mut(unit_id).damage(scaled, attacker);
    }
}

// ---------------------------------------------------------------------------
// Dead sweep
// ---------------------------------------------------------------------------

fn sweep_dead(sim: &mut GameSimulation, ctx: &mut SimulationContext) {
    let unit_ids = sim.units.ids();
    for &id in &unit_ids {
        if sim.units.try_get(id).is_none_or(|u| u.is_alive()) {
            continue;
        }

        // Last words: the death script gets one synchronous chance to pop
        // pieces off before the unit disappears.
        let _ = run_script_query(sim, ctx, id, "Killed", vec![0, 0]);

        let (position, rotation, unit_type) = {
            let unit = sim.units.get(id);
            (unit.position, unit.rotation, unit.unit_type.clone())
        };
        let def = ctx.db.unit_definition(&unit_type);
        let corpse = def.corpse.clone();
        let explode_as = def.explode_as.clone();

        // Cancel any in-flight path request.
        if let Some(task) = sim
            .units
            .get_mut(id)
            .moving_state_mut()
            .and_then(|ms| ms.path_requested.take())
        {
            ctx.path_service.cancel(task);
        }

        sim.units.get_mut(id).cob_env.kill_all();
        sim.remove_unit(ctx.db, id);

        ctx.events.push(SimEvent::UnitDied { unit: id, position });

        if let Some(weapon) = explode_as {
            let wdef = ctx.db.weapon_definition(&weapon).clone();
            apply_radial_damage(sim, ctx, position, &wdef.damage, wdef.damage_radius, None);
            ctx.events.push(SimEvent::Explosion {
                anim_name: weapon,
                position,
            });
        }

        if let Some(corpse) = corpse {
            let feature = super::MapFeature::new(&corpse, position, rotation);
            sim.spawn_feature(ctx.db, feature);
        }
    }

    let projectile_ids = sim.projectiles.ids();
    for &id in &projectile_ids {
        if sim.projectiles.get(id).is_dead {
            sim.projectiles.remove(id);
        }
    }
}
