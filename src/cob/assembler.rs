//! A small programmatic assembler for compiled scripts.
//!
//! Fixtures and tests author scripts through this instead of hand-counting
//! word offsets. Functions are declared up front so forward calls resolve;
//! jump targets use labels patched at finish.

use rustc_hash::FxHashMap;

use super::opcodes::{self, Axis};
use super::{CobFunctionInfo, CobScript};

#[derive(Default)]
pub struct ScriptAssembler {
    static_var_count: u32,
    piece_names: Vec<String>,
    functions: Vec<CobFunctionInfo>,
    function_indices: FxHashMap<String, usize>,
    instructions: Vec<u32>,
    labels: FxHashMap<String, usize>,
    fixups: Vec<(usize, String)>,
}

impl ScriptAssembler {
    pub fn new(static_var_count: u32, pieces: &[&str]) -> Self {
        Self {
            static_var_count,
            piece_names: pieces.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn piece(&self, name: &str) -> usize {
        self.piece_names
            .iter()
            .position(|p| p.eq_ignore_ascii_case(name))
            .unwrap_or_else(|| panic!("assembler: unknown piece {name}"))
    }

    /// Starts a new function at the current address.
    pub fn function(&mut self, name: &str) -> &mut Self {
        let index = self.functions.len();
        self.functions.push(CobFunctionInfo {
            name: name.to_string(),
            address: self.instructions.len() as u32,
        });
        self.function_indices.insert(name.to_string(), index);
        self
    }

    pub fn label(&mut self, name: &str) -> &mut Self {
        self.labels.insert(name.to_string(), self.instructions.len());
        self
    }

    fn emit(&mut self, words: &[u32]) -> &mut Self {
        self.instructions.extend_from_slice(words);
        self
    }

    pub fn push_constant(&mut self, v: i32) -> &mut Self {
        self.emit(&[opcodes::PUSH_CONSTANT, v as u32])
    }

    pub fn push_local(&mut self, i: u32) -> &mut Self {
        self.emit(&[opcodes::PUSH_LOCAL_VAR, i])
    }

    pub fn push_static(&mut self, i: u32) -> &mut Self {
        self.emit(&[opcodes::PUSH_STATIC, i])
    }

    pub fn create_local(&mut self) -> &mut Self {
        self.emit(&[opcodes::CREATE_LOCAL_VAR])
    }

    pub fn pop_local(&mut self, i: u32) -> &mut Self {
        self.emit(&[opcodes::POP_LOCAL_VAR, i])
    }

    pub fn pop_static(&mut self, i: u32) -> &mut Self {
        self.emit(&[opcodes::POP_STATIC, i])
    }

    pub fn pop_stack(&mut self) -> &mut Self {
        self.emit(&[opcodes::POP_STACK])
    }

    pub fn op(&mut self, opcode: u32) -> &mut Self {
        self.emit(&[opcode])
    }

    pub fn move_piece(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::MOVE, piece as u32, axis.to_operand()])
    }

    pub fn move_piece_now(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::MOVE_NOW, piece as u32, axis.to_operand()])
    }

    pub fn turn_piece(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::TURN, piece as u32, axis.to_operand()])
    }

    pub fn turn_piece_now(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::TURN_NOW, piece as u32, axis.to_operand()])
    }

    pub fn spin_piece(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::SPIN, piece as u32, axis.to_operand()])
    }

    pub fn stop_spin_piece(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::STOP_SPIN, piece as u32, axis.to_operand()])
    }

    pub fn show(&mut self, piece: usize) -> &mut Self {
        self.emit(&[opcodes::SHOW, piece as u32])
    }

    pub fn hide(&mut self, piece: usize) -> &mut Self {
        self.emit(&[opcodes::HIDE, piece as u32])
    }

    pub fn emit_sfx(&mut self, piece: usize) -> &mut Self {
        self.emit(&[opcodes::EMIT_SFX, piece as u32])
    }

    pub fn explode(&mut self, piece: usize) -> &mut Self {
        self.emit(&[opcodes::EXPLODE, piece as u32])
    }

    pub fn wait_for_turn(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::WAIT_FOR_TURN, piece as u32, axis.to_operand()])
    }

    pub fn wait_for_move(&mut self, piece: usize, axis: Axis) -> &mut Self {
        self.emit(&[opcodes::WAIT_FOR_MOVE, piece as u32, axis.to_operand()])
    }

    pub fn sleep(&mut self) -> &mut Self {
        self.emit(&[opcodes::SLEEP])
    }

    pub fn get_value(&mut self) -> &mut Self {
        self.emit(&[opcodes::GET_VALUE])
    }

    pub fn set_value(&mut self) -> &mut Self {
        self.emit(&[opcodes::SET_VALUE])
    }

    pub fn jump(&mut self, label: &str) -> &mut Self {
        self.instructions.push(opcodes::JUMP);
        self.fixups.push((self.instructions.len(), label.to_string()));
        self.instructions.push(0);
        self
    }

    pub fn jump_if_zero(&mut self, label: &str) -> &mut Self {
        self.instructions.push(opcodes::JUMP_IF_ZERO);
        self.fixups.push((self.instructions.len(), label.to_string()));
        self.instructions.push(0);
        self
    }

    pub fn start_script(&mut self, function: &str, arg_count: u32) -> &mut Self {
        let index = self.function_indices[function] as u32;
        self.emit(&[opcodes::START_SCRIPT, index, arg_count])
    }

    pub fn call_script(&mut self, function: &str, arg_count: u32) -> &mut Self {
        let index = self.function_indices[function] as u32;
        self.emit(&[opcodes::CALL_SCRIPT, index, arg_count])
    }

    pub fn signal(&mut self) -> &mut Self {
        self.emit(&[opcodes::SIGNAL])
    }

    pub fn set_signal_mask(&mut self) -> &mut Self {
        self.emit(&[opcodes::SET_SIGNAL_MASK])
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(&[opcodes::RETURN])
    }

    pub fn finish(mut self) -> CobScript {
        for (at, label) in std::mem::take(&mut self.fixups) {
            let target = *self
                .labels
                .get(&label)
                .unwrap_or_else(|| panic!("assembler: unknown label {label}"));
            self.instructions[at] = target as u32;
        }
        CobScript {
            static_var_count: self.static_var_count,
            piece_names: self.piece_names,
            functions: self.functions,
            instructions: self.instructions,
        }
    }
}
