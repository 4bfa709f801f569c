use crate::fixed_math::{SimAngle, SimScalar};
use crate::ids::{GameTime, GameTimeDelta};

use super::opcodes::{decode, Axis, Instruction};
use super::thread::{CobFrame, CobThread, ThreadStatus};
use super::{CobScript, ScriptError};

/// Instruction budget per thread per tick. A thread that burns through the
/// whole quantum is preempted and resumes at the same address next tick.
pub const SCRIPT_QUANTUM: u32 = 1000;

/// Everything the interpreter asks of the engine. The simulation implements
/// this per unit; tests implement it with plain records.
///
/// Piece indices passed in are script-local and already bounds-checked
/// against [`CobHost::piece_count`].
pub trait CobHost {
    fn piece_count(&self) -> usize;

    fn move_piece(&mut self, piece: usize, axis: Axis, target: SimScalar, speed: SimScalar);
    fn move_piece_now(&mut self, piece: usize, axis: Axis, target: SimScalar);
    fn turn_piece(&mut self, piece: usize, axis: Axis, target: SimAngle, speed: SimScalar);
    fn turn_piece_now(&mut self, piece: usize, axis: Axis, target: SimAngle);
    fn spin_piece(
        &mut self,
        piece: usize,
        axis: Axis,
        target_speed: SimScalar,
        acceleration: SimScalar,
    );
    fn stop_spin_piece(&mut self, piece: usize, axis: Axis, deceleration: SimScalar);
    fn set_piece_visible(&mut self, piece: usize, visible: bool);
    fn set_piece_shaded(&mut self, piece: usize, shaded: bool);
    fn is_move_in_progress(&self, piece: usize, axis: Axis) -> bool;
    fn is_turn_in_progress(&self, piece: usize, axis: Axis) -> bool;

    fn emit_sfx(&mut self, piece: usize, sfx_type: i32);
    fn explode_piece(&mut self, piece: usize, flags: i32);

    /// Uniform draw from the simulation RNG, `min..=max`.
    fn rand(&mut self, min: i32, max: i32) -> i32;

    fn get_value(&mut self, value_id: i32, args: [i32; 4]) -> i32;
    fn set_value(&mut self, value_id: i32, value: i32);

    /// Appends a thread to the owning unit's environment; it runs later in
    /// the same scheduler sweep.
    fn start_script(&mut self, function: usize, args: Vec<i32>, signal_mask: u32);

    /// Kills sibling threads whose mask intersects.
    fn signal(&mut self, mask: u32);
}

#[derive(Debug, PartialEq, Eq)]
pub enum ThreadOutcome {
    /// The thread set a wait condition or exhausted its quantum; its status
    /// says which.
    Suspended,
    Finished,
    Errored(ScriptError),
}

/// Scripts measure linear quantities in 1/65536ths of a world unit, which
/// is exactly the scalar's fractional precision.
fn linear_to_scalar(v: i32) -> SimScalar {
    SimScalar::from_bits(i64::from(v))
}

pub fn scalar_to_linear(v: SimScalar) -> i32 {
    v.to_bits() as i32
}

fn angle_from_script(v: i32) -> SimAngle {
    SimAngle(v as u16)
}

/// Angular speeds are in angle units per tick, carried as a plain count.
fn angular_speed_to_scalar(v: i32) -> SimScalar {
    SimScalar::from_num(v)
}

pub struct CobExecutionContext<'a, H: CobHost> {
    script: &'a CobScript,
    statics: &'a mut [i32],
    thread: &'a mut CobThread,
    host: &'a mut H,
}

impl<'a, H: CobHost> CobExecutionContext<'a, H> {
    pub fn new(
        script: &'a CobScript,
        statics: &'a mut [i32],
        thread: &'a mut CobThread,
        host: &'a mut H,
    ) -> Self {
        Self {
            script,
            statics,
            thread,
            host,
        }
    }

    /// Advances the thread until it suspends, finishes, errors, or runs out
    /// of quantum. On error the thread is marked finished; the caller logs
    /// and carries on.
    pub fn run(&mut self, now: GameTime) -> ThreadOutcome {
        debug_assert!(self.thread.status == ThreadStatus::Ready);

        for _ in 0..SCRIPT_QUANTUM {
            match self.step(now) {
                Ok(StepResult::Continue) => {}
                Ok(StepResult::Suspend) => return ThreadOutcome::Suspended,
                Ok(StepResult::Finish) => {
                    self.thread.status = ThreadStatus::Finished;
                    return ThreadOutcome::Finished;
                }
                Err(e) => {
                    self.thread.status = ThreadStatus::Finished;
                    return ThreadOutcome::Errored(e);
                }
            }
        }

        // Preempted; status stays Ready and the ip already points at the
        // next instruction.
        ThreadOutcome::Suspended
    }

    fn step(&mut self, now: GameTime) -> Result<StepResult, ScriptError> {
        let frame = self.thread.frames.last().ok_or(ScriptError::ReturnWithoutFrame)?;
        let (instruction, next_ip) = decode(&self.script.instructions, frame.ip)?;
        self.top_frame_mut().ip = next_ip;

        match instruction {
            Instruction::PushConstant(v) => self.push(v),
            Instruction::PushLocal(i) => {
                let v = *self
                    .top_frame()
                    .locals
                    .get(i)
                    .ok_or(ScriptError::LocalOutOfRange(i))?;
                self.push(v);
            }
            Instruction::PushStatic(i) => {
                let v = *self.statics.get(i).ok_or(ScriptError::StaticOutOfRange(i))?;
                self.push(v);
            }
            Instruction::CreateLocal => self.top_frame_mut().locals.push(0),
            Instruction::PopLocal(i) => {
                let v = self.pop()?;
                let slot = self
                    .top_frame_mut()
                    .locals
                    .get_mut(i)
                    .ok_or(ScriptError::LocalOutOfRange(i))?;
                *slot = v;
            }
            Instruction::PopStatic(i) => {
                let v = self.pop()?;
                let slot = self
                    .statics
                    .get_mut(i)
                    .ok_or(ScriptError::StaticOutOfRange(i))?;
                *slot = v;
            }
            Instruction::PopStack => {
                self.pop()?;
            }

            Instruction::Add => self.binary_op(i32::wrapping_add)?,
            Instruction::Sub => self.binary_op(i32::wrapping_sub)?,
            Instruction::Mul => self.binary_op(i32::wrapping_mul)?,
            Instruction::Div => {
                let b = self.pop()?;
                let a = self.pop()?;
                if b == 0 {
                    return Err(ScriptError::DivisionByZero);
                }
                self.push(a.wrapping_div(b));
            }
            Instruction::BitwiseAnd => self.binary_op(|a, b| a & b)?,
            Instruction::BitwiseOr => self.binary_op(|a, b| a | b)?,
            Instruction::BitwiseXor => self.binary_op(|a, b| a ^ b)?,
            Instruction::BitwiseNot => {
                let a = self.pop()?;
                self.push(!a);
            }

            Instruction::SetLess => self.binary_op(|a, b| i32::from(a < b))?,
            Instruction::SetLessOrEqual => self.binary_op(|a, b| i32::from(a <= b))?,
            Instruction::SetGreater => self.binary_op(|a, b| i32::from(a > b))?,
            Instruction::SetGreaterOrEqual => self.binary_op(|a, b| i32::from(a >= b))?,
            Instruction::SetEqual => self.binary_op(|a, b| i32::from(a == b))?,
            Instruction::SetNotEqual => self.binary_op(|a, b| i32::from(a != b))?,
            Instruction::LogicalAnd => self.binary_op(|a, b| i32::from(a != 0 && b != 0))?,
            Instruction::LogicalOr => self.binary_op(|a, b| i32::from(a != 0 || b != 0))?,
            Instruction::LogicalXor => self.binary_op(|a, b| i32::from((a != 0) != (b != 0)))?,
            Instruction::LogicalNot => {
                let a = self.pop()?;
                self.push(i32::from(a == 0));
            }

            Instruction::Rand => {
                let max = self.pop()?;
                let min = self.pop()?;
                let v = self.host.rand(min.min(max), min.max(max));
                self.push(v);
            }
            Instruction::GetValue => {
                let id = self.pop()?;
                let v = self.host.get_value(id, [0; 4]);
                self.push(v);
            }
            Instruction::GetValueWithArgs => {
                let a4 = self.pop()?;
                let a3 = self.pop()?;
                let a2 = self.pop()?;
                let a1 = self.pop()?;
                let id = self.pop()?;
                let v = self.host.get_value(id, [a1, a2, a3, a4]);
                self.push(v);
            }
            Instruction::SetValue => {
                let value = self.pop()?;
                let id = self.pop()?;
                self.host.set_value(id, value);
            }

            Instruction::Jump(target) => self.top_frame_mut().ip = target,
            Instruction::JumpIfZero(target) => {
                let condition = self.pop()?;
                if condition == 0 {
                    self.top_frame_mut().ip = target;
                }
            }
            Instruction::Return => {
                let frame = self.thread.frames.pop();
                if self.thread.frames.is_empty() {
                    self.thread.exit_locals = frame.map(|f| f.locals);
                    return Ok(StepResult::Finish);
                }
            }
            Instruction::CallScript {
                function,
                arg_count,
            } => {
                let entry = self.function_entry(function)?;
                let args = self.pop_args(arg_count)?;
                self.thread.frames.push(CobFrame {
                    ip: entry,
                    locals: args,
                });
            }
            Instruction::StartScript {
                function,
                arg_count,
            } => {
                self.function_entry(function)?;
                let args = self.pop_args(arg_count)?;
                let mask = self.thread.signal_mask;
                self.host.start_script(function, args, mask);
            }
            Instruction::Signal => {
                let mask = self.pop()?;
                self.host.signal(mask as u32);
            }
            Instruction::SetSignalMask => {
                let mask = self.pop()?;
                self.thread.signal_mask = mask as u32;
            }

            Instruction::Sleep => {
                let ms = self.pop()?;
                let delta = GameTimeDelta::from_milliseconds(ms.max(0) as u32);
                self.thread.status = ThreadStatus::Sleeping(now + delta);
                return Ok(StepResult::Suspend);
            }
            Instruction::WaitForTurn { piece, axis } => {
                self.check_piece(piece)?;
                self.thread.status = ThreadStatus::WaitForTurn { piece, axis };
                return Ok(StepResult::Suspend);
            }
            Instruction::WaitForMove { piece, axis } => {
                self.check_piece(piece)?;
                self.thread.status = ThreadStatus::WaitForMove { piece, axis };
                return Ok(StepResult::Suspend);
            }

            Instruction::Move { piece, axis } => {
                self.check_piece(piece)?;
                let speed = self.pop()?;
                let target = self.pop()?;
                self.host.move_piece(
                    piece,
                    axis,
                    linear_to_scalar(target),
                    linear_to_scalar(speed),
                );
            }
            Instruction::MoveNow { piece, axis } => {
                self.check_piece(piece)?;
                let target = self.pop()?;
                self.host.move_piece_now(piece, axis, linear_to_scalar(target));
            }
            Instruction::Turn { piece, axis } => {
                self.check_piece(piece)?;
                let speed = self.pop()?;
                let target = self.pop()?;
                self.host.turn_piece(
                    piece,
                    axis,
                    angle_from_script(target),
                    angular_speed_to_scalar(speed),
                );
            }
            Instruction::TurnNow { piece, axis } => {
                self.check_piece(piece)?;
                let target = self.pop()?;
                self.host.turn_piece_now(piece, axis, angle_from_script(target));
            }
            Instruction::Spin { piece, axis } => {
                self.check_piece(piece)?;
                let acceleration = self.pop()?;
                let target_speed = self.pop()?;
                self.host.spin_piece(
                    piece,
                    axis,
                    angular_speed_to_scalar(target_speed),
                    angular_speed_to_scalar(acceleration),
                );
            }
            Instruction::StopSpin { piece, axis } => {
                self.check_piece(piece)?;
                let deceleration = self.pop()?;
                self.host
                    .stop_spin_piece(piece, axis, angular_speed_to_scalar(deceleration));
            }
            Instruction::Show { piece } => {
                self.check_piece(piece)?;
                self.host.set_piece_visible(piece, true);
            }
            Instruction::Hide { piece } => {
                self.check_piece(piece)?;
                self.host.set_piece_visible(piece, false);
            }
            Instruction::Shade { piece } => {
                self.check_piece(piece)?;
                self.host.set_piece_shaded(piece, true);
            }
            Instruction::DontShade { piece } => {
                self.check_piece(piece)?;
                self.host.set_piece_shaded(piece, false);
            }
            Instruction::EmitSfx { piece } => {
                self.check_piece(piece)?;
                let sfx = self.pop()?;
                self.host.emit_sfx(piece, sfx);
            }
            Instruction::Explode { piece } => {
                self.check_piece(piece)?;
                let flags = self.pop()?;
                self.host.explode_piece(piece, flags);
            }
        }

        Ok(StepResult::Continue)
    }

    fn top_frame(&self) -> &CobFrame {
        self.thread.frames.last().expect("thread has no frame")
    }

    fn top_frame_mut(&mut self) -> &mut CobFrame {
        self.thread.frames.last_mut().expect("thread has no frame")
    }

    fn push(&mut self, v: i32) {
        self.thread.value_stack.push(v);
    }

    fn pop(&mut self) -> Result<i32, ScriptError> {
        self.thread
            .value_stack
            .pop()
            .ok_or(ScriptError::StackUnderflow)
    }

    fn pop_args(&mut self, count: usize) -> Result<Vec<i32>, ScriptError> {
        let mut args = vec![0; count];
        for slot in args.iter_mut().rev() {
            *slot = self.pop()?;
        }
        Ok(args)
    }

    fn binary_op(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), ScriptError> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b));
        Ok(())
    }

    fn check_piece(&self, piece: usize) -> Result<(), ScriptError> {
        if piece < self.host.piece_count() {
            Ok(())
        } else {
            Err(ScriptError::PieceOutOfRange(piece))
        }
    }

    fn function_entry(&self, function: usize) -> Result<usize, ScriptError> {
        self.script
            .functions
            .get(function)
            .map(|f| f.address as usize)
            .ok_or(ScriptError::FunctionOutOfRange(function))
    }
}

enum StepResult {
    Continue,
    Suspend,
    Finish,
}

/// Scheduler-side check: is a waiting thread's condition now satisfied?
pub fn is_thread_runnable(thread: &CobThread, now: GameTime, host: &impl CobHost) -> bool {
    match thread.status {
        ThreadStatus::Ready => true,
        ThreadStatus::Sleeping(wake) => now >= wake,
        ThreadStatus::WaitForMove { piece, axis } => !host.is_move_in_progress(piece, axis),
        ThreadStatus::WaitForTurn { piece, axis } => !host.is_turn_in_progress(piece, axis),
        ThreadStatus::Finished => false,
    }
}
