use rustc_hash::FxHashMap;

use super::opcodes::{self, Axis};
use super::*;
use crate::fixed_math::{SimAngle, SimScalar};
use crate::ids::GameTime;

/// Host that records what the script asked for.
#[derive(Default)]
struct TestHost {
    piece_count: usize,
    moves: Vec<(usize, Axis, SimScalar, SimScalar)>,
    turns: Vec<(usize, Axis, SimAngle, SimScalar)>,
    move_pending: bool,
    turn_pending: bool,
    values: FxHashMap<i32, i32>,
    started: Vec<(usize, Vec<i32>, u32)>,
    signals: Vec<u32>,
    sfx: Vec<(usize, i32)>,
    rand_results: Vec<i32>,
}

impl TestHost {
    fn with_pieces(piece_count: usize) -> Self {
        Self {
            piece_count,
            ..Default::default()
        }
    }
}

impl CobHost for TestHost {
    fn piece_count(&self) -> usize {
        self.piece_count
    }

    fn move_piece(&mut self, piece: usize, axis: Axis, target: SimScalar, speed: SimScalar) {
        self.moves.push((piece, axis, target, speed));
    }

    fn move_piece_now(&mut self, piece: usize, axis: Axis, target: SimScalar) {
        self.moves.push((piece, axis, target, SimScalar::ZERO));
    }

    fn turn_piece(&mut self, piece: usize, axis: Axis, target: SimAngle, speed: SimScalar) {
        self.turns.push((piece, axis, target, speed));
    }

    fn turn_piece_now(&mut self, piece: usize, axis: Axis, target: SimAngle) {
        self.turns.push((piece, axis, target, SimScalar::ZERO));
    }

    fn spin_piece(&mut self, _: usize, _: Axis, _: SimScalar, _: SimScalar) {}
    fn stop_spin_piece(&mut self, _: usize, _: Axis, _: SimScalar) {}
    fn set_piece_visible(&mut self, _: usize, _: bool) {}
    fn set_piece_shaded(&mut self, _: usize, _: bool) {}

    fn is_move_in_progress(&self, _: usize, _: Axis) -> bool {
        self.move_pending
    }

    fn is_turn_in_progress(&self, _: usize, _: Axis) -> bool {
        self.turn_pending
    }

    fn emit_sfx(&mut self, piece: usize, sfx_type: i32) {
        self.sfx.push((piece, sfx_type));
    }

    fn explode_piece(&mut self, _: usize, _: i32) {}

    fn rand(&mut self, min: i32, _max: i32) -> i32 {
        self.rand_results.pop().unwrap_or(min)
    }

    fn get_value(&mut self, value_id: i32, _args: [i32; 4]) -> i32 {
        *self.values.get(&value_id).unwrap_or(&0)
    }

    fn set_value(&mut self, value_id: i32, value: i32) {
        self.values.insert(value_id, value);
    }

    fn start_script(&mut self, function: usize, args: Vec<i32>, signal_mask: u32) {
        self.started.push((function, args, signal_mask));
    }

    fn signal(&mut self, mask: u32) {
        self.signals.push(mask);
    }
}

fn run_thread(
    script: &CobScript,
    function: &str,
    host: &mut TestHost,
) -> (CobThread, ThreadOutcome) {
    let mut env = ScriptEnvironment::new(script.static_var_count);
    let id = env.start_thread_by_name(script, function, vec![]).unwrap();
    let mut thread = env.threads.remove(0);
    assert_eq!(thread.id, id);
    let mut statics = std::mem::take(&mut env.statics);
    let outcome =
        CobExecutionContext::new(script, &mut statics, &mut thread, host).run(GameTime(0));
    (thread, outcome)
}

#[test]
fn arithmetic_on_the_value_stack() {
    let mut asm = ScriptAssembler::new(1, &[]);
    asm.function("Calc");
    // (7 + 5) * 3 - 2 = 34, stored in static 0
    asm.push_constant(7)
        .push_constant(5)
        .op(opcodes::ADD)
        .push_constant(3)
        .op(opcodes::MUL)
        .push_constant(2)
        .op(opcodes::SUB)
        .pop_static(0)
        .ret();
    let script = asm.finish();

    let mut env = ScriptEnvironment::new(script.static_var_count);
    env.start_thread_by_name(&script, "Calc", vec![]).unwrap();
    let mut thread = env.threads.remove(0);
    let mut statics = std::mem::take(&mut env.statics);
    let mut host = TestHost::with_pieces(0);
    let outcome =
        CobExecutionContext::new(&script, &mut statics, &mut thread, &mut host).run(GameTime(0));
    assert_eq!(outcome, ThreadOutcome::Finished);
    assert_eq!(statics[0], 34);
}

#[test]
fn division_by_zero_kills_only_the_thread() {
    let mut asm = ScriptAssembler::new(0, &[]);
    asm.function("Bad");
    asm.push_constant(1).push_constant(0).op(opcodes::DIV).ret();
    let script = asm.finish();

    let mut host = TestHost::with_pieces(0);
    let (thread, outcome) = run_thread(&script, "Bad", &mut host);
    assert_eq!(outcome, ThreadOutcome::Errored(ScriptError::DivisionByZero));
    assert!(thread.is_finished());
}

#[test]
fn loops_with_locals_and_conditional_jumps() {
    // local0 = 5; local1 = 0; while local0 != 0 { local1 += local0; local0 -= 1 }
    let mut asm = ScriptAssembler::new(1, &[]);
    asm.function("SumDown");
    asm.create_local()
        .create_local()
        .push_constant(5)
        .pop_local(0);
    asm.label("loop");
    asm.push_local(0).jump_if_zero("done");
    asm.push_local(1).push_local(0).op(opcodes::ADD).pop_local(1);
    asm.push_local(0).push_constant(1).op(opcodes::SUB).pop_local(0);
    asm.jump("loop");
    asm.label("done");
    asm.push_local(1).pop_static(0).ret();
    let script = asm.finish();

    let mut env = ScriptEnvironment::new(1);
    env.start_thread_by_name(&script, "SumDown", vec![]).unwrap();
    let mut thread = env.threads.remove(0);
    let mut statics = std::mem::take(&mut env.statics);
    let mut host = TestHost::with_pieces(0);
    let outcome =
        CobExecutionContext::new(&script, &mut statics, &mut thread, &mut host).run(GameTime(0));
    assert_eq!(outcome, ThreadOutcome::Finished);
    assert_eq!(statics[0], 15);
}

#[test]
fn call_script_is_synchronous() {
    let mut asm = ScriptAssembler::new(1, &[]);
    asm.function("Double");
    asm.push_local(0).push_constant(2).op(opcodes::MUL).pop_static(0).ret();
    asm.function("Main");
    asm.push_constant(21).call_script("Double", 1).ret();
    let script = asm.finish();

    let mut env = ScriptEnvironment::new(1);
    env.start_thread_by_name(&script, "Main", vec![]).unwrap();
    let mut thread = env.threads.remove(0);
    let mut statics = std::mem::take(&mut env.statics);
    let mut host = TestHost::with_pieces(0);
    let outcome =
        CobExecutionContext::new(&script, &mut statics, &mut thread, &mut host).run(GameTime(0));
    assert_eq!(outcome, ThreadOutcome::Finished);
    assert_eq!(statics[0], 42);
}

#[test]
fn start_script_goes_through_the_host_with_args_and_mask() {
    let mut asm = ScriptAssembler::new(0, &[]);
    asm.function("Worker");
    asm.ret();
    asm.function("Main");
    asm.push_constant(4)
        .set_signal_mask()
        .push_constant(10)
        .push_constant(20)
        .start_script("Worker", 2)
        .ret();
    let script = asm.finish();

    let mut host = TestHost::with_pieces(0);
    let (_, outcome) = run_thread(&script, "Main", &mut host);
    assert_eq!(outcome, ThreadOutcome::Finished);
    assert_eq!(host.started, vec![(0, vec![10, 20], 4)]);
}

#[test]
fn sleep_suspends_until_wake_tick() {
    let mut asm = ScriptAssembler::new(0, &[]);
    asm.function("Nap");
    asm.push_constant(500).sleep().ret();
    let script = asm.finish();

    let mut host = TestHost::with_pieces(0);
    let (thread, outcome) = run_thread(&script, "Nap", &mut host);
    assert_eq!(outcome, ThreadOutcome::Suspended);
    // 500ms at 30Hz rounds up to 15 ticks.
    assert_eq!(thread.status, ThreadStatus::Sleeping(GameTime(15)));
    assert!(!is_thread_runnable(&thread, GameTime(14), &host));
    assert!(is_thread_runnable(&thread, GameTime(15), &host));
}

#[test]
fn wait_for_turn_blocks_while_a_turn_is_pending() {
    let mut asm = ScriptAssembler::new(0, &["base"]);
    let base = asm.piece("base");
    asm.function("Aim");
    asm.push_constant(0x4000)
        .push_constant(512)
        .turn_piece(base, Axis::Y)
        .wait_for_turn(base, Axis::Y)
        .ret();
    let script = asm.finish();

    let mut host = TestHost::with_pieces(1);
    host.turn_pending = true;
    let (thread, outcome) = run_thread(&script, "Aim", &mut host);
    assert_eq!(outcome, ThreadOutcome::Suspended);
    assert_eq!(
        thread.status,
        ThreadStatus::WaitForTurn {
            piece: 0,
            axis: Axis::Y
        }
    );
    assert_eq!(host.turns.len(), 1);
    assert_eq!(host.turns[0].2, SimAngle(0x4000));

    assert!(!is_thread_runnable(&thread, GameTime(0), &host));
    host.turn_pending = false;
    assert!(is_thread_runnable(&thread, GameTime(0), &host));
}

#[test]
fn piece_index_out_of_range_is_a_script_error() {
    let mut asm = ScriptAssembler::new(0, &["base"]);
    asm.function("Broken");
    asm.push_constant(0).show(5).ret();
    let script = asm.finish();

    let mut host = TestHost::with_pieces(1);
    let (_, outcome) = run_thread(&script, "Broken", &mut host);
    assert_eq!(outcome, ThreadOutcome::Errored(ScriptError::PieceOutOfRange(5)));
}

#[test]
fn runaway_loop_is_preempted_not_fatal() {
    let mut asm = ScriptAssembler::new(0, &[]);
    asm.function("Spin");
    asm.label("forever");
    asm.jump("forever");
    let script = asm.finish();

    let mut host = TestHost::with_pieces(0);
    let (thread, outcome) = run_thread(&script, "Spin", &mut host);
    assert_eq!(outcome, ThreadOutcome::Suspended);
    assert_eq!(thread.status, ThreadStatus::Ready);
}

#[test]
fn signal_kills_matching_sibling_threads() {
    let mut asm = ScriptAssembler::new(0, &[]);
    asm.function("Idle");
    asm.push_constant(100000).sleep().ret();
    let script = asm.finish();

    let mut env = ScriptEnvironment::new(0);
    let a = env.start_thread(&script, 0, vec![], 0b01).unwrap();
    let b = env.start_thread(&script, 0, vec![], 0b10).unwrap();
    let c = env.start_thread(&script, 0, vec![], 0b11).unwrap();

    env.signal(0b01);
    assert!(!env.is_thread_alive(a));
    assert!(env.is_thread_alive(b));
    assert!(!env.is_thread_alive(c));

    env.reap();
    assert_eq!(env.threads.len(), 1);
    assert_eq!(env.threads[0].id, b);
}

#[test]
fn get_and_set_value_round_trip_through_the_host() {
    let mut asm = ScriptAssembler::new(1, &[]);
    asm.function("Check");
    // statics[0] = get(4); set(1, 1)
    asm.push_constant(4).get_value().pop_static(0);
    asm.push_constant(1).push_constant(1).set_value().ret();
    let script = asm.finish();

    let mut env = ScriptEnvironment::new(1);
    env.start_thread_by_name(&script, "Check", vec![]).unwrap();
    let mut thread = env.threads.remove(0);
    let mut statics = std::mem::take(&mut env.statics);
    let mut host = TestHost::with_pieces(0);
    host.values.insert(4, 88);
    let outcome =
        CobExecutionContext::new(&script, &mut statics, &mut thread, &mut host).run(GameTime(0));
    assert_eq!(outcome, ThreadOutcome::Finished);
    assert_eq!(statics[0], 88);
    assert_eq!(host.values.get(&1), Some(&1));
}
