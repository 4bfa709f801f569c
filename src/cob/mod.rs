//! The per-unit script virtual machine.
//!
//! Each unit type carries one compiled script: a flat `u32` instruction
//! array, a function table, a piece name table and a static variable count.
//! Units run cooperative threads over that program to animate pieces, aim
//! weapons and react to engine events. Thread state is an explicit record
//! (instruction pointer, value stack, call frames, signal mask, wait
//! status), so advancing a thread is an ordinary function over plain data —
//! nothing here depends on host-language coroutines.
//!
//! Scheduling contract, relied on by unit behaviour:
//! - every runnable thread advances each tick until it suspends, finishes,
//!   errors or exhausts its instruction quantum;
//! - a thread started with `START_SCRIPT` runs within the same tick, after
//!   its creator suspends;
//! - thread order within a unit is creation order;
//! - a runtime error kills the offending thread only.

use serde::{Deserialize, Serialize};

pub use assembler::ScriptAssembler;
pub use interp::{
    is_thread_runnable, scalar_to_linear, CobExecutionContext, CobHost, ThreadOutcome,
    SCRIPT_QUANTUM,
};
pub use opcodes::{decode, Axis, Instruction};
pub use thread::{CobFrame, CobThread, ThreadStatus};

mod assembler;
mod interp;
pub mod opcodes;
mod thread;

#[cfg(test)]
mod tests;

/// Script runtime errors. Each one terminates the thread that raised it;
/// the unit itself carries on (possibly inert).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("instruction pointer {0} outside program")]
    InstructionPointerOutOfRange(usize),
    #[error("unknown opcode {0:#010x}")]
    UnknownOpcode(u32),
    #[error("value stack underflow")]
    StackUnderflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("piece index {0} out of range")]
    PieceOutOfRange(usize),
    #[error("static variable index {0} out of range")]
    StaticOutOfRange(usize),
    #[error("local variable index {0} out of range")]
    LocalOutOfRange(usize),
    #[error("function index {0} out of range")]
    FunctionOutOfRange(usize),
    #[error("return with no call frame")]
    ReturnWithoutFrame,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CobFunctionInfo {
    pub name: String,
    /// Word offset into the instruction array.
    pub address: u32,
}

/// A compiled unit script in its in-memory shape. How it got here (legacy
/// binary, assembled fixture, RON asset) is the loader's business.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CobScript {
    pub static_var_count: u32,
    pub piece_names: Vec<String>,
    pub functions: Vec<CobFunctionInfo>,
    pub instructions: Vec<u32>,
}

impl CobScript {
    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// Per-unit script state: the static variables and the live threads.
#[derive(Clone, Debug, Default)]
pub struct ScriptEnvironment {
    pub statics: Vec<i32>,
    pub threads: Vec<CobThread>,
    next_thread_id: u32,
}

impl ScriptEnvironment {
    pub fn new(static_var_count: u32) -> Self {
        Self {
            statics: vec![0; static_var_count as usize],
            threads: Vec::new(),
            next_thread_id: 0,
        }
    }

    /// Appends a new thread for `function`. It will run no earlier than the
    /// current scheduler sweep reaches it, which keeps creation order and
    /// execution order identical.
    pub fn start_thread(
        &mut self,
        script: &CobScript,
        function_index: usize,
        args: Vec<i32>,
        signal_mask: u32,
    ) -> Result<u32, ScriptError> {
        let function = script
            .functions
            .get(function_index)
            .ok_or(ScriptError::FunctionOutOfRange(function_index))?;

        let id = self.next_thread_id;
        self.next_thread_id += 1;
        self.threads
            .push(CobThread::new(id, function.address as usize, args, signal_mask));
        Ok(id)
    }

    pub fn start_thread_by_name(
        &mut self,
        script: &CobScript,
        name: &str,
        args: Vec<i32>,
    ) -> Option<u32> {
        let index = script.function_index(name)?;
        self.start_thread(script, index, args, 0).ok()
    }

    pub fn thread(&self, id: u32) -> Option<&CobThread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn is_thread_alive(&self, id: u32) -> bool {
        self.thread(id)
            .is_some_and(|t| t.status != ThreadStatus::Finished)
    }

    /// Kills every thread whose signal mask intersects `mask`. The caller
    /// excludes itself by virtue of having been taken out of the thread
    /// list while it runs.
    pub fn signal(&mut self, mask: u32) {
        for thread in &mut self.threads {
            if thread.signal_mask & mask != 0 {
                thread.status = ThreadStatus::Finished;
            }
        }
    }

    /// Drops finished threads. Called once per tick after the sweep.
    pub fn reap(&mut self) {
        self.threads.retain(|t| t.status != ThreadStatus::Finished);
    }

    pub fn kill_all(&mut self) {
        self.threads.clear();
    }
}
