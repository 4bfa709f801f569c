//! Binds the script VM to the simulation.
//!
//! The interpreter sees the world through [`CobHost`]; this module
//! implements it for one unit at a time: piece operations land on the
//! unit's mesh state, engine queries read whatever simulation state they
//! name, and side effects go out as [`SimEvent`]s. While a thread runs it
//! is taken out of the unit's environment, which is also what exempts a
//! signalling thread from its own signal.

use tracing::warn;

use crate::cob::{Axis, CobExecutionContext, CobHost, CobThread, ThreadOutcome, ThreadStatus};
use crate::data::GameDatabase;
use crate::fixed_math::{atan2, hypot, Matrix4, SimAngle, SimScalar, SimVector};
use crate::ids::{GameTime, UnitId};

use super::mesh::piece_local_position;
use super::{GameSimulation, SimEvent, SimulationContext, UnitState};

// Engine value ids, shared between GET_VALUE and SET_VALUE.
pub const VAL_ACTIVATION: i32 = 1;
pub const VAL_STANDING_MOVE_ORDERS: i32 = 2;
pub const VAL_STANDING_FIRE_ORDERS: i32 = 3;
pub const VAL_HEALTH: i32 = 4;
pub const VAL_IN_BUILD_STANCE: i32 = 5;
pub const VAL_BUSY: i32 = 6;
pub const VAL_PIECE_XZ: i32 = 7;
pub const VAL_PIECE_Y: i32 = 8;
pub const VAL_UNIT_XZ: i32 = 9;
pub const VAL_UNIT_Y: i32 = 10;
pub const VAL_UNIT_HEIGHT: i32 = 11;
pub const VAL_XZ_ATAN: i32 = 12;
pub const VAL_XZ_HYPOT: i32 = 13;
pub const VAL_ATAN: i32 = 14;
pub const VAL_HYPOT: i32 = 15;
pub const VAL_GROUND_HEIGHT: i32 = 16;
pub const VAL_BUILD_PERCENT_LEFT: i32 = 17;
pub const VAL_YARD_OPEN: i32 = 18;

fn linear(v: SimScalar) -> i32 {
    crate::cob::scalar_to_linear(v)
}

fn from_linear(v: i32) -> SimScalar {
    SimScalar::from_bits(i64::from(v))
}

/// Packs two world coordinates into one script word, 16 bits each.
pub fn pack_xz(x: SimScalar, z: SimScalar) -> i32 {
    let xi = x.to_num::<i64>() as i16;
    let zi = z.to_num::<i64>() as i16;
    (((xi as u16 as u32) << 16) | (zi as u16 as u32)) as i32
}

pub fn unpack_xz(v: i32) -> (SimScalar, SimScalar) {
    let x = ((v as u32) >> 16) as i16;
    let z = (v as u32 & 0xffff) as i16;
    (SimScalar::from_num(x), SimScalar::from_num(z))
}

/// World transform of the unit body: yaw about Y at the unit position.
pub fn unit_transform(unit: &UnitState) -> Matrix4 {
    Matrix4::translation(unit.position)
        * Matrix4::rotation_y(
            crate::fixed_math::sin(unit.rotation),
            crate::fixed_math::cos(unit.rotation),
        )
}

/// World position of a model piece of a unit.
pub fn piece_world_position(
    sim: &GameSimulation,
    db: &GameDatabase,
    unit_id: UnitId,
    model_piece: usize,
) -> SimVector {
    let unit = sim.units.get(unit_id);
    let def = db.unit_definition(&unit.unit_type);
    let model = db.model(&def.object_name);
    let local = piece_local_position(model_piece, model, &unit.pieces);
    unit_transform(unit).transform_point(local)
}

struct UnitCobHost<'a> {
    sim: &'a mut GameSimulation,
    db: &'a GameDatabase,
    events: &'a mut Vec<SimEvent>,
    unit_id: UnitId,
    /// Script piece index to model piece index.
    binding: &'a [usize],
}

impl UnitCobHost<'_> {
    fn unit(&self) -> &UnitState {
        self.sim.units.get(self.unit_id)
    }

    fn unit_mut(&mut self) -> &mut UnitState {
        self.sim.units.get_mut(self.unit_id)
    }

    fn map(&self, piece: usize) -> usize {
        self.binding[piece]
    }
}

impl CobHost for UnitCobHost<'_> {
    fn piece_count(&self) -> usize {
        self.binding.len()
    }

    fn move_piece(&mut self, piece: usize, axis: Axis, target: SimScalar, speed: SimScalar) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].set_move_operation(axis, target, speed);
    }

    fn move_piece_now(&mut self, piece: usize, axis: Axis, target: SimScalar) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].move_now(axis, target);
    }

    fn turn_piece(&mut self, piece: usize, axis: Axis, target: SimAngle, speed: SimScalar) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].set_turn_operation(axis, target, speed);
    }

    fn turn_piece_now(&mut self, piece: usize, axis: Axis, target: SimAngle) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].turn_now(axis, target);
    }

    fn spin_piece(&mut self, piece: usize, axis: Axis, target_speed: SimScalar, acceleration: SimScalar) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].set_spin_operation(axis, target_speed, acceleration);
    }

    fn stop_spin_piece(&mut self, piece: usize, axis: Axis, deceleration: SimScalar) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].set_stop_spin_operation(axis, deceleration);
    }

    fn set_piece_visible(&mut self, piece: usize, visible: bool) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].visible = visible;
    }

    fn set_piece_shaded(&mut self, piece: usize, shaded: bool) {
        let i = self.map(piece);
        self.unit_mut().pieces[i].shaded = shaded;
    }

    fn is_move_in_progress(&self, piece: usize, axis: Axis) -> bool {
        self.unit().pieces[self.map(piece)].is_move_in_progress(axis)
    }

    fn is_turn_in_progress(&self, piece: usize, axis: Axis) -> bool {
        self.unit().pieces[self.map(piece)].is_turn_in_progress(axis)
    }

    fn emit_sfx(&mut self, piece: usize, sfx_type: i32) {
        let model_piece = self.map(piece);
        let position = piece_world_position(self.sim, self.db, self.unit_id, model_piece);
        self.events.push(SimEvent::UnitSfx {
            unit: self.unit_id,
            piece: model_piece,
            sfx_type,
            position,
        });
    }

    fn explode_piece(&mut self, piece: usize, flags: i32) {
        let model_piece = self.map(piece);
        let position = piece_world_position(self.sim, self.db, self.unit_id, model_piece);
        let vx = self.sim.rand_range(-8, 8);
        let vz = self.sim.rand_range(-8, 8);
        let vy = self.sim.rand_range(2, 10);
        self.events.push(SimEvent::PieceExplosion {
            position,
            velocity: SimVector::new(
                SimScalar::from_num(vx),
                SimScalar::from_num(vy),
                SimScalar::from_num(vz),
            ) / SimScalar::from_num(4),
            destruction_flags: flags,
        });
    }

    fn rand(&mut self, min: i32, max: i32) -> i32 {
        self.sim.rand_range(min, max)
    }

    fn get_value(&mut self, value_id: i32, args: [i32; 4]) -> i32 {
        match value_id {
            VAL_ACTIVATION => i32::from(self.unit().activated),
            VAL_STANDING_MOVE_ORDERS => 0,
            VAL_STANDING_FIRE_ORDERS => self.unit().fire_orders as i32,
            VAL_HEALTH => {
                let unit = self.unit();
                if unit.max_damage == 0 {
                    0
                } else {
                    (unit.hit_points * 100 / unit.max_damage) as i32
                }
            }
            VAL_IN_BUILD_STANCE => i32::from(self.unit().in_build_stance),
            VAL_BUSY => 0,
            VAL_PIECE_XZ => {
                let piece = args[0] as usize;
                if piece >= self.binding.len() {
                    return 0;
                }
                let p = piece_world_position(self.sim, self.db, self.unit_id, self.map(piece));
                pack_xz(p.x, p.z)
            }
            VAL_PIECE_Y => {
                let piece = args[0] as usize;
                if piece >= self.binding.len() {
                    return 0;
                }
                let p = piece_world_position(self.sim, self.db, self.unit_id, self.map(piece));
                linear(p.y)
            }
            VAL_UNIT_XZ => {
                let p = self.unit().position;
                pack_xz(p.x, p.z)
            }
            VAL_UNIT_Y => linear(self.unit().position.y),
            VAL_UNIT_HEIGHT => {
                let def = self.db.unit_definition(&self.unit().unit_type);
                linear(self.db.model(&def.object_name).height)
            }
            VAL_XZ_ATAN => {
                let (x, z) = unpack_xz(args[0]);
                i32::from(atan2(x, z).0)
            }
            VAL_XZ_HYPOT => {
                let (x, z) = unpack_xz(args[0]);
                linear(hypot(x, z))
            }
            VAL_ATAN => i32::from(atan2(from_linear(args[0]), from_linear(args[1])).0),
            VAL_HYPOT => linear(hypot(from_linear(args[0]), from_linear(args[1]))),
            VAL_GROUND_HEIGHT => {
                let h = self
                    .sim
                    .get_ground_height(from_linear(args[0]), from_linear(args[1]));
                linear(h)
            }
            VAL_BUILD_PERCENT_LEFT => {
                let left = (SimScalar::ONE - self.unit().build_time_completed)
                    * SimScalar::from_num(100);
                left.to_num::<i64>().clamp(0, 100) as i32
            }
            VAL_YARD_OPEN => i32::from(self.unit().yard_open),
            other => {
                warn!(unit = self.unit_id.0, value = other, "script read unknown value id");
                0
            }
        }
    }

    fn set_value(&mut self, value_id: i32, value: i32) {
        match value_id {
            VAL_ACTIVATION => self.unit_mut().activated = value != 0,
            VAL_STANDING_FIRE_ORDERS => {
                self.unit_mut().fire_orders = match value {
                    0 => crate::commands::FireOrders::HoldFire,
                    1 => crate::commands::FireOrders::ReturnFire,
                    _ => crate::commands::FireOrders::FireAtWill,
                };
            }
            VAL_IN_BUILD_STANCE => self.unit_mut().in_build_stance = value != 0,
            VAL_YARD_OPEN => {
                let open = value != 0;
                if self.unit().yard_open != open {
                    self.unit_mut().yard_open = open;
                    self.sim.stamp_building_yard(self.db, self.unit_id);
                }
            }
            other => {
                warn!(unit = self.unit_id.0, value = other, "script wrote unknown value id");
            }
        }
    }

    fn start_script(&mut self, function: usize, args: Vec<i32>, signal_mask: u32) {
        let unit_type = self.unit().unit_type.clone();
        let script = self.db.script(&unit_type);
        if let Err(e) = self
            .unit_mut()
            .cob_env
            .start_thread(script, function, args, signal_mask)
        {
            warn!(unit = self.unit_id.0, error = %e, "START_SCRIPT failed");
        }
    }

    fn signal(&mut self, mask: u32) {
        self.unit_mut().cob_env.signal(mask);
    }
}

fn is_runnable(unit: &UnitState, binding: &[usize], thread: &CobThread, now: GameTime) -> bool {
    match thread.status {
        ThreadStatus::Ready => true,
        ThreadStatus::Sleeping(wake) => now >= wake,
        ThreadStatus::WaitForMove { piece, axis } => piece >= binding.len()
            || !unit.pieces[binding[piece]].is_move_in_progress(axis),
        ThreadStatus::WaitForTurn { piece, axis } => piece >= binding.len()
            || !unit.pieces[binding[piece]].is_turn_in_progress(axis),
        ThreadStatus::Finished => false,
    }
}

/// Advances every runnable thread of one unit. Threads started during the
/// sweep are appended and picked up before it ends, so they run within the
/// same tick up to their first suspension.
pub fn run_unit_scripts(sim: &mut GameSimulation, ctx: &mut SimulationContext, unit_id: UnitId) {
    let Some(unit) = sim.units.try_get(unit_id) else {
        return;
    };
    let db = ctx.db;
    let unit_type = unit.unit_type.clone();
    let script = db.script(&unit_type);
    let binding: Vec<usize> = db.script_piece_binding(&unit_type).to_vec();
    let now = sim.game_time;

    let mut index = 0;
    while index < sim.units.get(unit_id).cob_env.threads.len() {
        let runnable = {
            let unit = sim.units.get(unit_id);
            is_runnable(unit, &binding, &unit.cob_env.threads[index], now)
        };
        if !runnable {
            index += 1;
            continue;
        }

        let mut thread = sim.units.get_mut(unit_id).cob_env.threads.remove(index);
        thread.status = ThreadStatus::Ready;
        let mut statics = std::mem::take(&mut sim.units.get_mut(unit_id).cob_env.statics);

        let outcome = {
            let mut host = UnitCobHost {
                sim,
                db,
                events: &mut *ctx.events,
                unit_id,
                binding: &binding,
            };
            CobExecutionContext::new(script, &mut statics, &mut thread, &mut host).run(now)
        };

        if let ThreadOutcome::Errored(error) = &outcome {
            warn!(
                unit = unit_id.0,
                unit_type, thread = thread.id, %error,
                "script thread died"
            );
        }

        let env = &mut sim.units.get_mut(unit_id).cob_env;
        env.statics = statics;
        env.threads.insert(index, thread);
        index += 1;
    }

    sim.units.get_mut(unit_id).cob_env.reap();
}

/// Runs a query entry point to completion within this call and returns its
/// root-frame locals (query scripts pass results through out-parameters).
/// Returns `None` if the function is missing or tries to suspend.
pub fn run_script_query(
    sim: &mut GameSimulation,
    ctx: &mut SimulationContext,
    unit_id: UnitId,
    function: &str,
    args: Vec<i32>,
) -> Option<Vec<i32>> {
    let db = ctx.db;
    let unit_type = sim.units.try_get(unit_id)?.unit_type.clone();
    let script = db.script(&unit_type);
    let binding: Vec<usize> = db.script_piece_binding(&unit_type).to_vec();
    let entry = script.function_index(function)?;
    let now = sim.game_time;

    let mut thread = CobThread::new(
        u32::MAX,
        script.functions[entry].address as usize,
        args,
        0,
    );
    let mut statics = std::mem::take(&mut sim.units.get_mut(unit_id).cob_env.statics);

    let outcome = {
        let mut host = UnitCobHost {
            sim,
            db,
            events: &mut *ctx.events,
            unit_id,
            binding: &binding,
        };
        CobExecutionContext::new(script, &mut statics, &mut thread, &mut host).run(now)
    };
    sim.units.get_mut(unit_id).cob_env.statics = statics;

    match outcome {
        ThreadOutcome::Finished => thread.exit_locals,
        ThreadOutcome::Suspended => {
            warn!(unit = unit_id.0, function, "query script tried to suspend");
            None
        }
        ThreadOutcome::Errored(error) => {
            warn!(unit = unit_id.0, function, %error, "query script died");
            None
        }
    }
}
