//! Instruction encoding.
//!
//! Instructions are 32-bit words. An opcode may be followed by inline
//! operand words (piece, axis, jump target, function index); everything
//! else travels on the value stack. The numeric opcode values follow the
//! classic compiled-script layout; binary compatibility with legacy assets
//! is not a goal, only shape compatibility for the loaders.

use serde::{Deserialize, Serialize};

use super::ScriptError;

pub const MOVE: u32 = 0x1000_1000;
pub const TURN: u32 = 0x1000_2000;
pub const SPIN: u32 = 0x1000_3000;
pub const STOP_SPIN: u32 = 0x1000_4000;
pub const SHOW: u32 = 0x1000_5000;
pub const HIDE: u32 = 0x1000_6000;
pub const MOVE_NOW: u32 = 0x1000_B000;
pub const TURN_NOW: u32 = 0x1000_C000;
pub const SHADE: u32 = 0x1000_D000;
pub const DONT_SHADE: u32 = 0x1000_E000;
pub const EMIT_SFX: u32 = 0x1000_F000;

pub const WAIT_FOR_TURN: u32 = 0x1001_1000;
pub const WAIT_FOR_MOVE: u32 = 0x1001_2000;
pub const SLEEP: u32 = 0x1001_3000;

pub const PUSH_CONSTANT: u32 = 0x1002_1001;
pub const PUSH_LOCAL_VAR: u32 = 0x1002_1002;
pub const PUSH_STATIC: u32 = 0x1002_1004;
pub const CREATE_LOCAL_VAR: u32 = 0x1002_2000;
pub const POP_LOCAL_VAR: u32 = 0x1002_3002;
pub const POP_STATIC: u32 = 0x1002_3004;
pub const POP_STACK: u32 = 0x1002_4000;

pub const ADD: u32 = 0x1003_1000;
pub const SUB: u32 = 0x1003_2000;
pub const MUL: u32 = 0x1003_3000;
pub const DIV: u32 = 0x1003_4000;
pub const BITWISE_AND: u32 = 0x1003_5000;
pub const BITWISE_OR: u32 = 0x1003_6000;
pub const BITWISE_XOR: u32 = 0x1003_7000;
pub const BITWISE_NOT: u32 = 0x1003_8000;

pub const RAND: u32 = 0x1004_1000;
pub const GET_VALUE: u32 = 0x1004_2000;
pub const GET_VALUE_WITH_ARGS: u32 = 0x1004_3000;

pub const SET_LESS: u32 = 0x1005_1000;
pub const SET_LESS_OR_EQUAL: u32 = 0x1005_2000;
pub const SET_GREATER: u32 = 0x1005_3000;
pub const SET_GREATER_OR_EQUAL: u32 = 0x1005_4000;
pub const SET_EQUAL: u32 = 0x1005_5000;
pub const SET_NOT_EQUAL: u32 = 0x1005_6000;
pub const LOGICAL_AND: u32 = 0x1005_7000;
pub const LOGICAL_OR: u32 = 0x1005_8000;
pub const LOGICAL_XOR: u32 = 0x1005_9000;
pub const LOGICAL_NOT: u32 = 0x1005_A000;

pub const START_SCRIPT: u32 = 0x1006_1000;
pub const CALL_SCRIPT: u32 = 0x1006_2000;
pub const JUMP: u32 = 0x1006_4000;
pub const RETURN: u32 = 0x1006_5000;
pub const JUMP_IF_ZERO: u32 = 0x1006_6000;
pub const SIGNAL: u32 = 0x1006_7000;
pub const SET_SIGNAL_MASK: u32 = 0x1006_8000;

pub const EXPLODE: u32 = 0x1007_1000;
pub const SET_VALUE: u32 = 0x1008_2000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn from_operand(word: u32) -> Option<Axis> {
        match word {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn to_operand(self) -> u32 {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A decoded instruction. Piece indices are script-local; the host maps
/// them onto model pieces through the binding made at load time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Move { piece: usize, axis: Axis },
    MoveNow { piece: usize, axis: Axis },
    Turn { piece: usize, axis: Axis },
    TurnNow { piece: usize, axis: Axis },
    Spin { piece: usize, axis: Axis },
    StopSpin { piece: usize, axis: Axis },
    Show { piece: usize },
    Hide { piece: usize },
    Shade { piece: usize },
    DontShade { piece: usize },
    EmitSfx { piece: usize },
    Explode { piece: usize },

    WaitForTurn { piece: usize, axis: Axis },
    WaitForMove { piece: usize, axis: Axis },
    Sleep,

    PushConstant(i32),
    PushLocal(usize),
    PushStatic(usize),
    CreateLocal,
    PopLocal(usize),
    PopStatic(usize),
    PopStack,

    Add,
    Sub,
    Mul,
    Div,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,

    Rand,
    GetValue,
    GetValueWithArgs,
    SetValue,

    SetLess,
    SetLessOrEqual,
    SetGreater,
    SetGreaterOrEqual,
    SetEqual,
    SetNotEqual,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    LogicalNot,

    StartScript { function: usize, arg_count: usize },
    CallScript { function: usize, arg_count: usize },
    Jump(usize),
    JumpIfZero(usize),
    Return,
    Signal,
    SetSignalMask,
}

/// Reads one instruction starting at `ip`, returning it together with the
/// address of the next instruction.
pub fn decode(instructions: &[u32], ip: usize) -> Result<(Instruction, usize), ScriptError> {
    let mut cursor = ip;
    let mut fetch = || {
        let word = instructions
            .get(cursor)
            .copied()
            .ok_or(ScriptError::InstructionPointerOutOfRange(cursor))?;
        cursor += 1;
        Ok::<u32, ScriptError>(word)
    };

    let opcode = fetch()?;
    let instruction = match opcode {
        MOVE | MOVE_NOW | TURN | TURN_NOW | SPIN | STOP_SPIN | WAIT_FOR_TURN | WAIT_FOR_MOVE => {
            let piece = fetch()? as usize;
            let axis =
                Axis::from_operand(fetch()?).ok_or(ScriptError::UnknownOpcode(opcode))?;
            match opcode {
                MOVE => Instruction::Move { piece, axis },
                MOVE_NOW => Instruction::MoveNow { piece, axis },
                TURN => Instruction::Turn { piece, axis },
                TURN_NOW => Instruction::TurnNow { piece, axis },
                SPIN => Instruction::Spin { piece, axis },
                STOP_SPIN => Instruction::StopSpin { piece, axis },
                WAIT_FOR_TURN => Instruction::WaitForTurn { piece, axis },
                _ => Instruction::WaitForMove { piece, axis },
            }
        }
        SHOW => Instruction::Show {
            piece: fetch()? as usize,
        },
        HIDE => Instruction::Hide {
            piece: fetch()? as usize,
        },
        SHADE => Instruction::Shade {
            piece: fetch()? as usize,
        },
        DONT_SHADE => Instruction::DontShade {
            piece: fetch()? as usize,
        },
        EMIT_SFX => Instruction::EmitSfx {
            piece: fetch()? as usize,
        },
        EXPLODE => Instruction::Explode {
            piece: fetch()? as usize,
        },
        SLEEP => Instruction::Sleep,

        PUSH_CONSTANT => Instruction::PushConstant(fetch()? as i32),
        PUSH_LOCAL_VAR => Instruction::PushLocal(fetch()? as usize),
        PUSH_STATIC => Instruction::PushStatic(fetch()? as usize),
        CREATE_LOCAL_VAR => Instruction::CreateLocal,
        POP_LOCAL_VAR => Instruction::PopLocal(fetch()? as usize),
        POP_STATIC => Instruction::PopStatic(fetch()? as usize),
        POP_STACK => Instruction::PopStack,

        ADD => Instruction::Add,
        SUB => Instruction::Sub,
        MUL => Instruction::Mul,
        DIV => Instruction::Div,
        BITWISE_AND => Instruction::BitwiseAnd,
        BITWISE_OR => Instruction::BitwiseOr,
        BITWISE_XOR => Instruction::BitwiseXor,
        BITWISE_NOT => Instruction::BitwiseNot,

        RAND => Instruction::Rand,
        GET_VALUE => Instruction::GetValue,
        GET_VALUE_WITH_ARGS => Instruction::GetValueWithArgs,
        SET_VALUE => Instruction::SetValue,

        SET_LESS => Instruction::SetLess,
        SET_LESS_OR_EQUAL => Instruction::SetLessOrEqual,
        SET_GREATER => Instruction::SetGreater,
        SET_GREATER_OR_EQUAL => Instruction::SetGreaterOrEqual,
        SET_EQUAL => Instruction::SetEqual,
        SET_NOT_EQUAL => Instruction::SetNotEqual,
        LOGICAL_AND => Instruction::LogicalAnd,
        LOGICAL_OR => Instruction::LogicalOr,
        LOGICAL_XOR => Instruction::LogicalXor,
        LOGICAL_NOT => Instruction::LogicalNot,

        START_SCRIPT => Instruction::StartScript {
            function: fetch()? as usize,
            arg_count: fetch()? as usize,
        },
        CALL_SCRIPT => Instruction::CallScript {
            function: fetch()? as usize,
            arg_count: fetch()? as usize,
        },
        JUMP => Instruction::Jump(fetch()? as usize),
        JUMP_IF_ZERO => Instruction::JumpIfZero(fetch()? as usize),
        RETURN => Instruction::Return,
        SIGNAL => Instruction::Signal,
        SET_SIGNAL_MASK => Instruction::SetSignalMask,

        other => return Err(ScriptError::UnknownOpcode(other)),
    };

    Ok((instruction, cursor))
}
