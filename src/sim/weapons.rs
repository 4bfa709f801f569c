//! Weapon aiming and firing.
//!
//! Each weapon is a little state machine: pick a target, ask the unit
//! script to slew the mounting pieces, then fire bursts while the aim
//! stays within tolerance. Aim scripts run as ordinary unit threads; the
//! weapon watches for its thread to finish rather than being called back.

use tracing::warn;

use crate::commands::{AttackTarget, FireOrders};
use crate::data::{GameDatabase, ProjectilePhysicsType, WeaponDefinition};
use crate::fixed_math::{
    angle_between, atan2, cos, hypot, sin, SimAngle, SimScalar, SimVector,
};
use crate::ids::{GameTimeDelta, UnitId};

use super::cob_glue::{piece_world_position, run_script_query};
use super::projectile::{gravity, Projectile};
use super::unit::{
    AimInfo, AttackInfo, AttackingState, FireInfo, UnitWeapon, WeaponAttackTarget, WeaponState,
};
use super::{GameSimulation, SimEvent, SimulationContext};

fn aim_function(index: usize) -> String {
    match index {
        0 => "AimPrimary".to_string(),
        1 => "AimSecondary".to_string(),
        2 => "AimTertiary".to_string(),
        n => format!("AimWeapon{}", n + 1),
    }
}

fn fire_function(index: usize) -> String {
    match index {
        0 => "FirePrimary".to_string(),
        1 => "FireSecondary".to_string(),
        2 => "FireTertiary".to_string(),
        n => format!("FireWeapon{}", n + 1),
    }
}

fn query_function(index: usize) -> String {
    match index {
        0 => "QueryPrimary".to_string(),
        1 => "QuerySecondary".to_string(),
        2 => "QueryTertiary".to_string(),
        n => format!("QueryWeapon{}", n + 1),
    }
}

/// Applies an explicit attack order to every weapon slot.
pub fn issue_attack_order(
    sim: &mut GameSimulation,
    _ctx: &mut SimulationContext,
    unit_id: UnitId,
    target: AttackTarget,
) {
    let target = match target {
        AttackTarget::Unit(u) => WeaponAttackTarget::Unit(u),
        AttackTarget::Ground(p) => WeaponAttackTarget::Ground(p),
    };
    let unit = sim.units.get_mut(unit_id);
    for weapon in unit.weapons.iter_mut().flatten() {
        weapon.state = WeaponState::Attacking(AttackingState {
            target,
            info: AttackInfo::Targeting,
        });
    }
}

pub fn update_unit_weapons(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId) {
    let Some(unit) = sim.units.try_get(unit_id) else {
        return;
    };
    if !unit.is_alive() || !unit.is_fully_built() {
        return;
    }
    if !ctx.db.unit_definition(&unit.unit_type).can_attack {
        return;
    }

    let weapon_count = unit.weapons.len();
    for index in 0..weapon_count {
        update_weapon(sim, ctx, unit_id, index);
    }
}

fn weapon_of(sim: &GameSimulation, unit_id: UnitId, index: usize) -> Option<&UnitWeapon> {
    sim.units.get(unit_id).weapons.get(index)?.as_ref()
}

fn weapon_mut(sim: &mut GameSimulation, unit_id: UnitId, index: usize) -> &mut UnitWeapon {
    sim.units.get_mut(unit_id).weapons[index]
        .as_mut()
        .expect("weapon slot emptied mid-update")
}

fn update_weapon(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId, index: usize) {
    let Some(weapon) = weapon_of(sim, unit_id, index) else {
        return;
    };
    let weapon_type = weapon.weapon_type.clone();
    let def = ctx.db.weapon_definition(&weapon_type).clone();
    let now = sim.game_time;

    // Acquire or validate the target.
    let state = weapon_of(sim, unit_id, index).unwrap().state.clone();
    let state = match state {
        WeaponState::Idle => match acquire_target(sim, unit_id, &def) {
            Some(target) => WeaponState::Attacking(AttackingState {
                target,
                info: AttackInfo::Targeting,
            }),
            None => {
                weapon_mut(sim, unit_id, index).state = WeaponState::Idle;
                return;
            }
        },
        WeaponState::Attacking(attacking) => {
            if target_is_valid(sim, ctx.db, unit_id, &def, attacking.target) {
                WeaponState::Attacking(attacking)
            } else {
                weapon_mut(sim, unit_id, index).state = WeaponState::Idle;
                return;
            }
        }
    };

    let WeaponState::Attacking(mut attacking) = state else {
        return;
    };
    let target_position = resolve_target_position(sim, ctx.db, attacking.target);

    match attacking.info.clone() {
        AttackInfo::Targeting => {
            let (heading, pitch) = compute_aim(sim, ctx.db, unit_id, &def, target_position);
            begin_aiming(sim, ctx, unit_id, index, &mut attacking, heading, pitch);
        }
        AttackInfo::Aiming(aim) => {
            if sim.units.get(unit_id).cob_env.is_thread_alive(aim.thread) {
                // Script still slewing pieces.
            } else {
                let (heading, pitch) = compute_aim(sim, ctx.db, unit_id, &def, target_position);
                let on_target = angle_between(heading, aim.last_heading).0 <= def.tolerance.0
                    && angle_between(pitch, aim.last_pitch).0 <= def.pitch_tolerance.0;
                if on_target {
                    let ready = weapon_of(sim, unit_id, index).unwrap().ready_time;
                    attacking.info = AttackInfo::Firing(FireInfo {
                        heading,
                        pitch,
                        target_position,
                        firing_piece: resolve_firing_piece(sim, ctx, unit_id, index),
                        bursts_fired: 0,
                        ready_time: ready.max(now),
                    });
                } else {
                    // Target drifted; aim again.
                    begin_aiming(sim, ctx, unit_id, index, &mut attacking, heading, pitch);
                }
            }
        }
        AttackInfo::Firing(mut fire) => {
            if now >= fire.ready_time {
                fire_once(
                    sim,
                    ctx,
                    unit_id,
                    index,
                    &weapon_type,
                    &def,
                    &mut fire,
                    target_position,
                );
                if fire.bursts_fired >= def.burst.max(1) {
                    weapon_mut(sim, unit_id, index).ready_time =
                        now + GameTimeDelta(def.reload_ticks());
                    attacking.info = AttackInfo::Targeting;
                } else {
                    fire.ready_time = now + GameTimeDelta(def.burst_interval_ticks());
                    attacking.info = AttackInfo::Firing(fire);
                }
            } else {
                attacking.info = AttackInfo::Firing(fire);
            }
        }
    }

    weapon_mut(sim, unit_id, index).state = WeaponState::Attacking(attacking);
}

fn begin_aiming(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    index: usize,
    attacking: &mut AttackingState,
    heading: SimAngle,
    pitch: SimAngle,
) {
    let unit_type = sim.units.get(unit_id).unit_type.clone();
    let script = ctx.db.script(&unit_type);
    let function = aim_function(index);

    match script.function_index(&function) {
        Some(fn_index) => {
            let env = &mut sim.units.get_mut(unit_id).cob_env;
            match env.start_thread(
                script,
                fn_index,
                vec![i32::from(heading.0), i32::from(pitch.0)],
                0,
            ) {
                Ok(thread) => {
                    attacking.info = AttackInfo::Aiming(AimInfo {
                        thread,
                        last_heading: heading,
                        last_pitch: pitch,
                    });
                }
                Err(e) => {
                    warn!(unit = unit_id.0, error = %e, "aim script failed to start");
                    attacking.info = AttackInfo::Targeting;
                }
            }
        }
        None => {
            // No aim script: the weapon is considered always on target.
            let now = sim.game_time;
            let ready = weapon_of(sim, unit_id, index).unwrap().ready_time;
            let target_position = resolve_target_position(sim, ctx.db, attacking.target);
            attacking.info = AttackInfo::Firing(FireInfo {
                heading,
                pitch,
                target_position,
                firing_piece: resolve_firing_piece(sim, ctx, unit_id, index),
                bursts_fired: 0,
                ready_time: ready.max(now),
            });
        }
    }
}

/// Asks the script which piece the projectile leaves from.
fn resolve_firing_piece(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    index: usize,
) -> Option<usize> {
    let unit_type = sim.units.get(unit_id).unit_type.clone();
    let binding = ctx.db.script_piece_binding(&unit_type).to_vec();
    let out = run_script_query(sim, ctx, unit_id, &query_function(index), vec![0])?;
    let script_piece = *out.first()? as usize;
    binding.get(script_piece).copied()
}

fn acquire_target(
    sim: &GameSimulation,
    unit_id: UnitId,
    def: &WeaponDefinition,
) -> Option<WeaponAttackTarget> {
    if def.command_fire {
        return None;
    }
    let unit = sim.units.get(unit_id);
    match unit.fire_orders {
        FireOrders::HoldFire => None,
        FireOrders::ReturnFire => {
            let attacker = unit.last_attacker?;
            let valid = sim
                .units
                .try_get(attacker)
                .is_some_and(|t| t.is_alive() && in_range(unit.position, t.position, def));
            valid.then_some(WeaponAttackTarget::Unit(attacker))
        }
        FireOrders::FireAtWill => {
            // Nearest enemy in range; id breaks distance ties so all peers
            // agree.
            let mut best: Option<(SimScalar, UnitId)> = None;
            for (other_id, other) in sim.units.iter() {
                if other_id == unit_id || other.owner == unit.owner || !other.is_alive() {
                    continue;
                }
                let distance = (other.position - unit.position).horizontal_length();
                if distance > def.max_range {
                    continue;
                }
                if best.is_none_or(|(d, id)| (distance, other_id) < (d, id)) {
                    best = Some((distance, other_id));
                }
            }
            best.map(|(_, id)| WeaponAttackTarget::Unit(id))
        }
    }
}

fn in_range(from: SimVector, to: SimVector, def: &WeaponDefinition) -> bool {
    (to - from).horizontal_length() <= def.max_range
}

fn target_is_valid(
    sim: &GameSimulation,
    _db: &GameDatabase,
    unit_id: UnitId,
    def: &WeaponDefinition,
    target: WeaponAttackTarget,
) -> bool {
    let unit = sim.units.get(unit_id);
    match target {
        WeaponAttackTarget::Unit(t) => sim
            .units
            .try_get(t)
            .is_some_and(|t| t.is_alive() && in_range(unit.position, t.position, def)),
        WeaponAttackTarget::Ground(p) => in_range(unit.position, p, def),
    }
}

fn resolve_target_position(
    sim: &GameSimulation,
    db: &GameDatabase,
    target: WeaponAttackTarget,
) -> SimVector {
    match target {
        WeaponAttackTarget::Ground(p) => p,
        WeaponAttackTarget::Unit(t) => {
            let unit = sim.units.get(t);
            let def = db.unit_definition(&unit.unit_type);
            let model = db.model(&def.object_name);
            let mut p = unit.position;
            p.y += model.height / SimScalar::from_num(2);
            p
        }
    }
}

/// Desired aim: heading relative to the unit's facing, and launch pitch.
fn compute_aim(
    sim: &GameSimulation,
    db: &GameDatabase,
    unit_id: UnitId,
    def: &WeaponDefinition,
    target_position: SimVector,
) -> (SimAngle, SimAngle) {
    let unit = sim.units.get(unit_id);
    let unit_def = db.unit_definition(&unit.unit_type);
    let model = db.model(&unit_def.object_name);

    let mut origin = unit.position;
    origin.y += model.height / SimScalar::from_num(2);

    let delta = target_position - origin;
    let world_heading = atan2(delta.x, delta.z);
    let relative_heading = world_heading - unit.rotation;

    let horizontal = hypot(delta.x, delta.z);
    let pitch = match def.physics_type {
        ProjectilePhysicsType::LineOfSight => atan2(delta.y, horizontal),
        ProjectilePhysicsType::Ballistic => ballistic_pitch(horizontal, def.velocity),
    };

    (relative_heading, pitch)
}

/// Low-arc launch pitch over flat ground: sin(2θ) = g·d / v².
fn ballistic_pitch(distance: SimScalar, velocity: SimScalar) -> SimAngle {
    if velocity <= SimScalar::ZERO {
        return SimAngle(0);
    }
    let ratio = (gravity() * distance / (velocity * velocity)).min(SimScalar::ONE);
    // asin via atan2, then halve.
    let complement = (SimScalar::ONE - ratio * ratio).max(SimScalar::ZERO).sqrt();
    let double_pitch = atan2(ratio, complement);
    SimAngle(double_pitch.0 / 2)
}

#[allow(clippy::too_many_arguments)]
fn fire_once(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    index: usize,
    weapon_type: &str,
    def: &WeaponDefinition,
    fire: &mut FireInfo,
    target_position: SimVector,
) {
    let now = sim.game_time;

    // Refresh the solution against where the target is now.
    let (relative_heading, pitch) = compute_aim(sim, ctx.db, unit_id, def, target_position);
    fire.heading = relative_heading;
    fire.pitch = pitch;
    fire.target_position = target_position;

    let spawn_position = match fire.firing_piece {
        Some(piece) => piece_world_position(sim, ctx.db, unit_id, piece),
        None => {
            let unit = sim.units.get(unit_id);
            let unit_def = ctx.db.unit_definition(&unit.unit_type);
            let model = ctx.db.model(&unit_def.object_name);
            let mut p = unit.position;
            p.y += model.height;
            p
        }
    };

    let mut world_heading = sim.units.get(unit_id).rotation + fire.heading;
    if def.spray_angle.0 > 0 {
        let spread = i32::from(def.spray_angle.0);
        let deviation = sim.rand_range(-spread, spread);
        world_heading += SimAngle(deviation as u16);
    }

    let direction = SimVector::new(
        sin(world_heading) * cos(fire.pitch),
        sin(fire.pitch),
        cos(world_heading) * cos(fire.pitch),
    );

    let die_on_frame = def.weapon_timer.map(|timer| {
        let decay = def
            .random_decay
            .map(|d| sim.rand_range(0, d as i32) as u32)
            .unwrap_or(0);
        now + GameTimeDelta(timer + decay)
    });

    let owner = sim.units.get(unit_id).owner;
    let projectile = Projectile {
        weapon_type: weapon_type.to_string(),
        owner,
        position: spawn_position,
        previous_position: spawn_position,
        origin: spawn_position,
        velocity: direction * def.velocity,
        gravity: def.physics_type == ProjectilePhysicsType::Ballistic,
        render_type: def.render_type.clone(),
        end_smoke: def.end_smoke,
        smoke_trail: def.smoke_trail,
        last_smoke: now,
        damage: def.damage.clone(),
        damage_radius: def.damage_radius,
        die_on_frame,
        spawned_at: now,
        is_dead: false,
    };
    sim.projectiles.insert(projectile);

    if def.sound_trigger || fire.bursts_fired == 0 {
        ctx.events.push(SimEvent::WeaponFired {
            weapon_type: weapon_type.to_string(),
            position: spawn_position,
        });
    }

    // Fire animation (recoil, flash) runs as a fresh thread.
    let unit_type = sim.units.get(unit_id).unit_type.clone();
    let script = ctx.db.script(&unit_type);
    let _ = sim
        .units
        .get_mut(unit_id)
        .cob_env
        .start_thread_by_name(script, &fire_function(index), vec![]);

    fire.bursts_fired += 1;
}
