//! Per-piece animation state.
//!
//! Scripts set pending operations (move, turn, spin, stop-spin) per piece
//! and axis; the tick advances each pending operation by exactly the tick
//! delta. A move or turn that reaches its target clamps to it and clears
//! the operation, which is what wakes `WAIT_FOR_MOVE`/`WAIT_FOR_TURN`
//! script threads.

use crate::cob::Axis;
use crate::data::UnitModelDefinition;
use crate::fixed_math::{
    abs, cos, sin, turn_towards, Matrix4, SimAngle, SimScalar, SimVector,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveOperation {
    pub target_position: SimScalar,
    /// World units per tick.
    pub speed: SimScalar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TurnOperation {
    pub target_angle: SimAngle,
    /// Angle units per tick.
    pub speed: SimScalar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinOperation {
    pub current_speed: SimScalar,
    pub target_speed: SimScalar,
    pub acceleration: SimScalar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSpinOperation {
    pub current_speed: SimScalar,
    pub deceleration: SimScalar,
}

/// The three rotation-affecting operations share one slot per axis; a spin
/// replaces a turn and vice versa.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOperationKind {
    Turn(TurnOperation),
    Spin(SpinOperation),
    StopSpin(StopSpinOperation),
}

#[derive(Clone, Debug)]
pub struct UnitMeshState {
    /// Matches the model piece at the same index, by construction.
    pub name: String,
    pub visible: bool,
    pub shaded: bool,

    pub offset: SimVector,
    pub previous_offset: SimVector,
    pub rotations: [SimAngle; 3],
    pub previous_rotations: [SimAngle; 3],

    pub move_operations: [Option<MoveOperation>; 3],
    pub turn_operations: [Option<TurnOperationKind>; 3],
}

impl UnitMeshState {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            shaded: true,
            offset: SimVector::ZERO,
            previous_offset: SimVector::ZERO,
            rotations: [SimAngle(0); 3],
            previous_rotations: [SimAngle(0); 3],
            move_operations: [None; 3],
            turn_operations: [None; 3],
        }
    }

    pub fn rotation(&self, axis: Axis) -> SimAngle {
        self.rotations[axis_index(axis)]
    }

    pub fn offset_component(&self, axis: Axis) -> SimScalar {
        match axis {
            Axis::X => self.offset.x,
            Axis::Y => self.offset.y,
            Axis::Z => self.offset.z,
        }
    }

    fn offset_component_mut(&mut self, axis: Axis) -> &mut SimScalar {
        match axis {
            Axis::X => &mut self.offset.x,
            Axis::Y => &mut self.offset.y,
            Axis::Z => &mut self.offset.z,
        }
    }

    pub fn set_move_operation(&mut self, axis: Axis, target: SimScalar, speed: SimScalar) {
        self.move_operations[axis_index(axis)] = Some(MoveOperation {
            target_position: target,
            speed,
        });
    }

    pub fn move_now(&mut self, axis: Axis, target: SimScalar) {
        *self.offset_component_mut(axis) = target;
        self.move_operations[axis_index(axis)] = None;
    }

    pub fn set_turn_operation(&mut self, axis: Axis, target: SimAngle, speed: SimScalar) {
        self.turn_operations[axis_index(axis)] = Some(TurnOperationKind::Turn(TurnOperation {
            target_angle: target,
            speed,
        }));
    }

    pub fn turn_now(&mut self, axis: Axis, target: SimAngle) {
        self.rotations[axis_index(axis)] = target;
        self.turn_operations[axis_index(axis)] = None;
    }

    pub fn set_spin_operation(&mut self, axis: Axis, target_speed: SimScalar, acceleration: SimScalar) {
        let i = axis_index(axis);
        // A spin that replaces a running spin keeps its momentum.
        let current_speed = match self.turn_operations[i] {
            Some(TurnOperationKind::Spin(op)) => op.current_speed,
            Some(TurnOperationKind::StopSpin(op)) => op.current_speed,
            _ => SimScalar::ZERO,
        };
        self.turn_operations[i] = Some(TurnOperationKind::Spin(SpinOperation {
            current_speed,
            target_speed,
            acceleration,
        }));
    }

    pub fn set_stop_spin_operation(&mut self, axis: Axis, deceleration: SimScalar) {
        let i = axis_index(axis);
        let current_speed = match self.turn_operations[i] {
            Some(TurnOperationKind::Spin(op)) => op.current_speed,
            Some(TurnOperationKind::StopSpin(op)) => op.current_speed,
            _ => return,
        };
        self.turn_operations[i] = Some(TurnOperationKind::StopSpin(StopSpinOperation {
            current_speed,
            deceleration,
        }));
    }

    pub fn is_move_in_progress(&self, axis: Axis) -> bool {
        self.move_operations[axis_index(axis)].is_some()
    }

    /// Spins never finish on their own, so only plain turns count.
    pub fn is_turn_in_progress(&self, axis: Axis) -> bool {
        matches!(
            self.turn_operations[axis_index(axis)],
            Some(TurnOperationKind::Turn(_))
        )
    }

    /// Advances all pending operations by `dt` ticks and caches the
    /// previous state for render interpolation.
    pub fn update(&mut self, dt: SimScalar) {
        self.previous_offset = self.offset;
        self.previous_rotations = self.rotations;

        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let i = axis_index(axis);

            if let Some(op) = self.move_operations[i] {
                let current = self.offset_component(axis);
                let remaining = op.target_position - current;
                let frame_speed = op.speed * dt;
                if abs(remaining) <= frame_speed {
                    *self.offset_component_mut(axis) = op.target_position;
                    self.move_operations[i] = None;
                } else if remaining > SimScalar::ZERO {
                    *self.offset_component_mut(axis) = current + frame_speed;
                } else {
                    *self.offset_component_mut(axis) = current - frame_speed;
                }
            }

            match &mut self.turn_operations[i] {
                None => {}
                Some(TurnOperationKind::Turn(op)) => {
                    let frame_speed = SimAngle::from_scalar(op.speed * dt);
                    let target = op.target_angle;
                    self.rotations[i] = turn_towards(self.rotations[i], target, frame_speed);
                    if self.rotations[i] == target {
                        self.turn_operations[i] = None;
                    }
                }
                Some(TurnOperationKind::Spin(op)) => {
                    let remaining = op.target_speed - op.current_speed;
                    if abs(remaining) <= op.acceleration {
                        op.current_speed = op.target_speed;
                    } else if remaining > SimScalar::ZERO {
                        op.current_speed += op.acceleration;
                    } else {
                        op.current_speed -= op.acceleration;
                    }
                    let frame_speed = op.current_speed * dt;
                    if frame_speed >= SimScalar::ZERO {
                        self.rotations[i] += SimAngle::from_scalar(frame_speed);
                    } else {
                        self.rotations[i] -= SimAngle::from_scalar(-frame_speed);
                    }
                }
                Some(TurnOperationKind::StopSpin(op)) => {
                    if abs(op.current_speed) <= op.deceleration {
                        self.turn_operations[i] = None;
                        continue;
                    }
                    if op.current_speed > SimScalar::ZERO {
                        op.current_speed -= op.deceleration;
                    } else {
                        op.current_speed += op.deceleration;
                    }
                    let frame_speed = op.current_speed * dt;
                    if frame_speed >= SimScalar::ZERO {
                        self.rotations[i] += SimAngle::from_scalar(frame_speed);
                    } else {
                        self.rotations[i] -= SimAngle::from_scalar(-frame_speed);
                    }
                }
            }
        }
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

/// Builds the fresh piece state array for a model; order and names follow
/// the model's piece list exactly.
pub fn pieces_for_model(model: &UnitModelDefinition) -> Vec<UnitMeshState> {
    model
        .pieces
        .iter()
        .map(|p| UnitMeshState::new(&p.name))
        .collect()
}

/// Local transform of one piece and all its ancestors:
/// `T(origin + offset) · Rz · Rx · Ry`, composed up the parent chain. The
/// Z-X-Y order is observable to scripts and must not change.
pub fn piece_transform(
    piece_index: usize,
    model: &UnitModelDefinition,
    pieces: &[UnitMeshState],
) -> Matrix4 {
    debug_assert_eq!(model.pieces.len(), pieces.len());

    let mut matrix = Matrix4::identity();
    let mut cursor = Some(piece_index);
    while let Some(index) = cursor {
        let definition = &model.pieces[index];
        let state = &pieces[index];

        let position = definition.origin + state.offset;
        let [rx, ry, rz] = state.rotations;
        matrix = Matrix4::translation(position)
            * Matrix4::rotation_zxy(sin(rx), cos(rx), sin(ry), cos(ry), sin(rz), cos(rz))
            * matrix;

        cursor = model.parent_indices[index];
    }

    matrix
}

/// Piece position in the unit's local frame.
pub fn piece_local_position(
    piece_index: usize,
    model: &UnitModelDefinition,
    pieces: &[UnitMeshState],
) -> SimVector {
    piece_transform(piece_index, model, pieces).transform_point(SimVector::ZERO)
}
