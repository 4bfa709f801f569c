//! A* pathfinding over the discrete terrain grid.
//!
//! Costs are octile distances (straight/diagonal step counts) with a turn
//! count as a lexicographic tie-breaker, so paths prefer straight runs. The
//! per-unit walkability rules live in [`finder`]; [`service`] queues requests
//! and delivers results at tick boundaries so the simulation stays
//! deterministic.

use serde::{Deserialize, Serialize};

use crate::collections::Point;
use crate::fixed_math::SimScalar;

pub use astar::{AStarResult, PathFinder, MAX_PATH_ITERATIONS};
pub use finder::{PathDestination, PathWorldView, UnitPathFinder};
pub use service::{PathFindingService, PathRequest};

mod astar;
mod finder;
mod service;

#[cfg(test)]
mod tests;

/// The eight grid directions. Iteration order is fixed; changing it changes
/// tie-breaking between equal-cost paths on every peer at once or not at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthWest,
    West,
    SouthWest,
    South,
    SouthEast,
    East,
    NorthEast,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
        Direction::East,
        Direction::NorthEast,
    ];

    pub fn to_point(self) -> Point {
        match self {
            Direction::North => Point::new(0, -1),
            Direction::NorthWest => Point::new(-1, -1),
            Direction::West => Point::new(-1, 0),
            Direction::SouthWest => Point::new(-1, 1),
            Direction::South => Point::new(0, 1),
            Direction::SouthEast => Point::new(1, 1),
            Direction::East => Point::new(1, 0),
            Direction::NorthEast => Point::new(1, -1),
        }
    }

    pub fn from_point(p: Point) -> Option<Direction> {
        let d = Point::new(p.x.signum(), p.y.signum());
        Direction::ALL.into_iter().find(|dir| dir.to_point() == d)
    }

    pub fn is_diagonal(self) -> bool {
        let p = self.to_point();
        p.x != 0 && p.y != 0
    }
}

/// A distance in grid squares separated into straight and diagonal
/// components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OctileDistance {
    pub straight: i32,
    pub diagonal: i32,
}

// sqrt(2) in the scalar's own precision, used only to collapse a distance to
// a comparable magnitude.
fn sqrt_two() -> SimScalar {
    SimScalar::from_bits(92682)
}

impl OctileDistance {
    pub fn new(straight: i32, diagonal: i32) -> Self {
        Self { straight, diagonal }
    }

    /// Distance covering a displacement of `x` by `y`: diagonal steps over
    /// the shared span, straight steps for the remainder.
    pub fn from_x_and_y(x: i32, y: i32) -> Self {
        let (lo, hi) = if x.abs() < y.abs() {
            (x.abs(), y.abs())
        } else {
            (y.abs(), x.abs())
        };
        Self {
            straight: hi - lo,
            diagonal: lo,
        }
    }

    /// Collapses to a real magnitude for heuristic comparison.
    pub fn to_scalar(self) -> SimScalar {
        SimScalar::from_num(self.straight) + SimScalar::from_num(self.diagonal) * sqrt_two()
    }
}

impl std::ops::Add for OctileDistance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            straight: self.straight + rhs.straight,
            diagonal: self.diagonal + rhs.diagonal,
        }
    }
}

impl PartialOrd for OctileDistance {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OctileDistance {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_scalar()
            .cmp(&other.to_scalar())
            .then_with(|| (self.straight, self.diagonal).cmp(&(other.straight, other.diagonal)))
    }
}

pub fn octile_distance(start: Point, goal: Point) -> OctileDistance {
    OctileDistance::from_x_and_y(goal.x - start.x, goal.y - start.y)
}

/// Path cost: octile distance first, number of turns as tie-breaker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathCost {
    pub distance: OctileDistance,
    pub turn_count: i32,
}

impl PathCost {
    pub fn new(distance: OctileDistance, turn_count: i32) -> Self {
        Self {
            distance,
            turn_count,
        }
    }
}

impl std::ops::Add for PathCost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            distance: self.distance + rhs.distance,
            turn_count: self.turn_count + rhs.turn_count,
        }
    }
}

/// Collapses consecutive steps in the same direction into single endpoints.
/// The input must contain at least one element.
pub fn simplify_path(input: &[Point]) -> Vec<Point> {
    let mut out = vec![input[0]];
    let mut direction = Point::new(0, 0);

    for window in input.windows(2) {
        let next_direction = window[1] - window[0];
        if next_direction == direction {
            *out.last_mut().unwrap() = window[1];
        } else {
            out.push(window[1]);
            direction = next_direction;
        }
    }

    out
}
