use super::finder::PathWorldView;
use super::*;
use crate::collections::{DiscreteRect, Grid, Point};

/// Test world: a plain bool grid, true = walkable, no buildings.
struct GridWorld {
    walkable: Grid<bool>,
}

impl GridWorld {
    fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len();
        let width = rows[0].len();
        let walkable = Grid::from_fn(width, height, |p| {
            rows[p.y as usize].as_bytes()[p.x as usize] == b'.'
        });
        Self { walkable }
    }
}

impl PathWorldView for GridWorld {
    fn is_footprint_free(&self, rect: &DiscreteRect) -> bool {
        self.walkable.is_rect_in_bounds(rect) && !self.walkable.any_in_rect(rect, |c| !*c)
    }

    fn is_grid_point_walkable(&self, p: Point) -> bool {
        *self.walkable.try_get(p).unwrap_or(&false)
    }

    fn is_passable_through_building(&self, _p: Point) -> bool {
        false
    }

    fn is_adjacent_to_obstacle(&self, rect: &DiscreteRect) -> bool {
        let ring = rect.expand(1);
        let result = ring
            .cells()
            .any(|p| !rect.contains(p) && self.walkable.try_get(p).is_some_and(|c| !*c));
        result
    }
}

fn cell_path(world: &GridWorld, start: Point, goal: Point) -> AStarResult {
    UnitPathFinder::new(world, 1, 1, PathDestination::Cell(goal)).find(start)
}

#[test]
fn straight_line_on_open_ground() {
    let world = GridWorld::from_rows(&["....", "....", "...."]);
    let result = cell_path(&world, Point::new(0, 1), Point::new(3, 1));
    assert!(result.reached_goal);
    assert_eq!(result.path.first(), Some(&Point::new(0, 1)));
    assert_eq!(result.path.last(), Some(&Point::new(3, 1)));
    assert_eq!(result.path.len(), 4);
}

#[test]
fn route_around_wall_avoids_blocked_cells() {
    // Wall down column 5, rows 1..=8, on a 10x10 grid.
    let mut rows = vec![String::from("..........")];
    for _ in 1..=8 {
        rows.push(String::from(".....#...."));
    }
    rows.push(String::from(".........."));
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    let world = GridWorld::from_rows(&refs);

    let start = Point::new(0, 4);
    let goal = Point::new(9, 4);
    let result = cell_path(&world, start, goal);
    assert!(result.reached_goal);
    assert_eq!(result.path.first(), Some(&start));
    assert_eq!(result.path.last(), Some(&goal));
    for p in &result.path {
        assert!(world.is_grid_point_walkable(*p), "path crosses wall at {p:?}");
    }

    // The detour through the top corridor costs at most the manhattan-ish
    // bound of going up, across and back down.
    let cost = octile_distance(start, Point::new(5, 0))
        + octile_distance(Point::new(5, 0), goal);
    let path_steps = result.path.len() as i32 - 1;
    assert!(path_steps <= cost.straight + cost.diagonal);
}

#[test]
fn unreachable_goal_returns_closest_best_effort() {
    let world = GridWorld::from_rows(&[
        "...#.",
        "...#.",
        "...#.",
        "...#.",
        "...#.",
    ]);
    let result = cell_path(&world, Point::new(0, 2), Point::new(4, 2));
    assert!(!result.reached_goal);
    // Best effort walks up against the wall.
    assert_eq!(result.path.last().map(|p| p.x), Some(2));
}

#[test]
fn perimeter_goal_stops_adjacent_to_rect() {
    let world = GridWorld::from_rows(&["......", "......", "......", "......"]);
    let rect = DiscreteRect::new(3, 1, 2, 2);
    let finder = UnitPathFinder::new(&world, 1, 1, PathDestination::NearRect(rect));
    let result = finder.find(Point::new(0, 0));
    assert!(result.reached_goal);
    let last = *result.path.last().unwrap();
    assert!(rect.top_left_touches_perimeter(last.x, last.y));
}

#[test]
fn octile_distance_splits_components() {
    let d = octile_distance(Point::new(0, 0), Point::new(3, 5));
    assert_eq!(d, OctileDistance::new(2, 3));
    assert_eq!(
        octile_distance(Point::new(2, 2), Point::new(2, 2)),
        OctileDistance::new(0, 0)
    );
}

#[test]
fn octile_ordering_matches_magnitude() {
    // 2 diagonals (~2.83) beat 3 straights.
    assert!(OctileDistance::new(0, 2) < OctileDistance::new(3, 0));
    assert!(OctileDistance::new(1, 0) < OctileDistance::new(0, 1));
}

#[test]
fn path_cost_breaks_ties_on_turns() {
    let d = OctileDistance::new(4, 0);
    assert!(PathCost::new(d, 0) < PathCost::new(d, 1));
    assert!(PathCost::new(OctileDistance::new(3, 0), 5) < PathCost::new(d, 0));
}

#[test]
fn simplify_collapses_straight_runs() {
    let input = vec![
        Point::new(0, 0),
        Point::new(1, 0),
        Point::new(2, 0),
        Point::new(3, 0),
        Point::new(3, 1),
        Point::new(3, 2),
    ];
    assert_eq!(
        simplify_path(&input),
        vec![Point::new(0, 0), Point::new(3, 0), Point::new(3, 2)]
    );
}

#[test]
fn simplify_keeps_single_point() {
    assert_eq!(simplify_path(&[Point::new(4, 4)]), vec![Point::new(4, 4)]);
}

#[test]
fn service_hands_out_monotonic_tasks_and_respects_budget() {
    let mut service = PathFindingService::new(2);
    let u = crate::ids::UnitId(0);
    let t1 = service.request(u, PathDestination::Cell(Point::new(1, 1)));
    let t2 = service.request(u, PathDestination::Cell(Point::new(2, 2)));
    let t3 = service.request(u, PathDestination::Cell(Point::new(3, 3)));
    assert_ne!(t1, t2);

    let batch = service.take_batch();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].task, t1);
    assert_eq!(service.pending(), 1);

    service.cancel(t3);
    assert_eq!(service.pending(), 0);
    assert!(service.take_batch().is_empty());
}
