use crate::collections::{DiscreteRect, Point};

use super::astar::{find_path, AStarResult, PathFinder};
use super::{octile_distance, OctileDistance, PathCost};

/// What a path request is trying to reach.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathDestination {
    /// The exact cell.
    Cell(Point),
    /// Any cell whose footprint touches the rectangle's perimeter one cell
    /// out, for walking up to buildings and build sites.
    NearRect(DiscreteRect),
}

/// The world queries a path search needs. The simulation provides the real
/// implementation; tests substitute plain grids.
pub trait PathWorldView {
    /// True when a footprint rectangle overlaps no unit or feature that the
    /// pathing unit cannot share cells with.
    fn is_footprint_free(&self, rect: &DiscreteRect) -> bool;

    /// The precomputed movement-class answer for "can this class stand with
    /// its top-left corner here".
    fn is_grid_point_walkable(&self, p: Point) -> bool;

    /// True when the cell belongs to a building's yard map and is currently
    /// marked passable (an open factory bay).
    fn is_passable_through_building(&self, p: Point) -> bool;

    /// True when the footprint rectangle touches an occupied cell, used for
    /// the rough-terrain cost doubling.
    fn is_adjacent_to_obstacle(&self, rect: &DiscreteRect) -> bool;
}

pub struct UnitPathFinder<'a, W> {
    world: &'a W,
    footprint_x: u32,
    footprint_z: u32,
    destination: PathDestination,
}

impl<'a, W: PathWorldView> UnitPathFinder<'a, W> {
    pub fn new(
        world: &'a W,
        footprint_x: u32,
        footprint_z: u32,
        destination: PathDestination,
    ) -> Self {
        Self {
            world,
            footprint_x,
            footprint_z,
            destination,
        }
    }

    pub fn find(&self, start: Point) -> AStarResult {
        find_path(self, start)
    }

    fn footprint_at(&self, p: Point) -> DiscreteRect {
        DiscreteRect::new(p.x, p.y, self.footprint_x, self.footprint_z)
    }
}

impl<W: PathWorldView> PathFinder for UnitPathFinder<'_, W> {
    fn is_goal(&self, vertex: Point) -> bool {
        match self.destination {
            PathDestination::Cell(goal) => vertex == goal,
            PathDestination::NearRect(rect) => rect.top_left_touches_perimeter(vertex.x, vertex.y),
        }
    }

    fn estimate_cost_to_goal(&self, vertex: Point) -> PathCost {
        let distance = match self.destination {
            PathDestination::Cell(goal) => octile_distance(vertex, goal),
            PathDestination::NearRect(rect) => {
                rect.octile_distance_to_top_left_touching(vertex.x, vertex.y)
            }
        };
        PathCost::new(distance, estimate_turns(distance))
    }

    fn is_walkable(&self, vertex: Point) -> bool {
        self.world.is_footprint_free(&self.footprint_at(vertex))
            && (self.world.is_grid_point_walkable(vertex)
                || self.world.is_passable_through_building(vertex))
    }

    fn is_rough_terrain(&self, vertex: Point) -> bool {
        self.world.is_adjacent_to_obstacle(&self.footprint_at(vertex))
    }
}

fn estimate_turns(distance: OctileDistance) -> i32 {
    i32::from(distance.straight > 0 && distance.diagonal > 0)
}
