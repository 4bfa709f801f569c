use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tracing::warn;

use crate::collections::Point;

use super::{octile_distance, Direction, PathCost};

/// Safety cap on expanded nodes; a search that large means the request was
/// degenerate (fully walled-off goal on a huge map).
pub const MAX_PATH_ITERATIONS: usize = 20_000;

/// The per-search hooks. The A* core owns successor generation and turn
/// accounting; implementations decide walkability and the goal condition.
pub trait PathFinder {
    fn is_goal(&self, vertex: Point) -> bool;

    /// Admissible, consistent estimate of the remaining cost.
    fn estimate_cost_to_goal(&self, vertex: Point) -> PathCost;

    fn is_walkable(&self, vertex: Point) -> bool;

    /// Cells hugging an obstacle cost double, which pushes paths a cell away
    /// from walls and so keeps simplified paths from clipping corners.
    fn is_rough_terrain(&self, vertex: Point) -> bool;
}

pub struct AStarResult {
    /// Cell sequence from start to the reached vertex, start included.
    pub path: Vec<Point>,
    /// False when the search exhausted its options and `path` only leads to
    /// the closest vertex it saw.
    pub reached_goal: bool,
}

struct ClosedNode {
    vertex: Point,
    predecessor: Option<usize>,
    direction: Option<Direction>,
}

#[derive(PartialEq, Eq)]
struct OpenEntry {
    estimated_total: PathCost,
    sequence: u64,
    vertex: Point,
    cost_to_reach: PathCost,
    predecessor: Option<usize>,
    direction: Option<Direction>,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so the cheapest entry pops first,
        // with insertion order as the deterministic tie-break.
        other
            .estimated_total
            .cmp(&self.estimated_total)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs A* from `start`. Always returns a path; when the goal is
/// unreachable the path leads to the closest vertex encountered and
/// `reached_goal` is false.
pub fn find_path(finder: &impl PathFinder, start: Point) -> AStarResult {
    let mut open = BinaryHeap::new();
    let mut closed: Vec<ClosedNode> = Vec::new();
    let mut closed_by_vertex: FxHashMap<Point, usize> = FxHashMap::default();
    let mut best_open_cost: FxHashMap<Point, PathCost> = FxHashMap::default();

    let mut sequence = 0u64;
    open.push(OpenEntry {
        estimated_total: finder.estimate_cost_to_goal(start),
        sequence,
        vertex: start,
        cost_to_reach: PathCost::default(),
        predecessor: None,
        direction: None,
    });
    best_open_cost.insert(start, PathCost::default());

    let mut closest: Option<(PathCost, usize)> = None;
    let mut iterations = 0usize;

    while let Some(entry) = open.pop() {
        if closed_by_vertex.contains_key(&entry.vertex) {
            continue;
        }

        iterations += 1;
        if iterations > MAX_PATH_ITERATIONS {
            warn!(
                "path search exceeded {} expansions, returning closest",
                MAX_PATH_ITERATIONS
            );
            break;
        }

        let index = closed.len();
        closed.push(ClosedNode {
            vertex: entry.vertex,
            predecessor: entry.predecessor,
            direction: entry.direction,
        });
        closed_by_vertex.insert(entry.vertex, index);

        if finder.is_goal(entry.vertex) {
            return AStarResult {
                path: walk_path(&closed, index),
                reached_goal: true,
            };
        }

        let remaining = finder.estimate_cost_to_goal(entry.vertex);
        if closest.is_none_or(|(best, _)| remaining < best) {
            closest = Some((remaining, index));
        }

        for direction in Direction::ALL {
            let neighbour = entry.vertex + direction.to_point();
            if closed_by_vertex.contains_key(&neighbour) || !finder.is_walkable(neighbour) {
                continue;
            }

            let mut distance = octile_distance(entry.vertex, neighbour);
            if finder.is_rough_terrain(neighbour) {
                distance = distance + distance;
            }
            let turns = i32::from(entry.direction.is_some_and(|d| d != direction));
            let cost_to_reach = entry.cost_to_reach + PathCost::new(distance, turns);

            if best_open_cost
                .get(&neighbour)
                .is_some_and(|&known| known <= cost_to_reach)
            {
                continue;
            }
            best_open_cost.insert(neighbour, cost_to_reach);

            sequence += 1;
            open.push(OpenEntry {
                estimated_total: cost_to_reach + finder.estimate_cost_to_goal(neighbour),
                sequence,
                vertex: neighbour,
                cost_to_reach,
                predecessor: Some(index),
                direction: Some(direction),
            });
        }
    }

    let index = closest.map_or(0, |(_, i)| i);
    AStarResult {
        path: walk_path(&closed, index),
        reached_goal: false,
    }
}

fn walk_path(closed: &[ClosedNode], end: usize) -> Vec<Point> {
    let mut items = Vec::new();
    let mut cursor = Some(end);
    while let Some(i) = cursor {
        items.push(closed[i].vertex);
        cursor = closed[i].predecessor;
    }
    items.reverse();
    items
}
