use super::*;
use crate::ids::UnitId;

#[test]
fn vec_map_issues_sequential_ids() {
    let mut map: VecMap<UnitId, &str> = VecMap::new();
    let a = map.insert("a");
    let b = map.insert("b");
    assert_eq!(a, UnitId(0));
    assert_eq!(b, UnitId(1));
    assert_eq!(*map.get(a), "a");
    assert_eq!(map.len(), 2);
}

#[test]
fn vec_map_never_reuses_removed_ids() {
    let mut map: VecMap<UnitId, u32> = VecMap::new();
    let a = map.insert(1);
    let b = map.insert(2);
    assert_eq!(map.remove(a), Some(1));
    let c = map.insert(3);
    assert_ne!(c, a);
    assert_eq!(c, UnitId(2));
    assert!(!map.contains(a));
    assert!(map.contains(b));
    assert_eq!(map.len(), 2);
}

#[test]
fn vec_map_iterates_in_id_order() {
    let mut map: VecMap<UnitId, u32> = VecMap::new();
    let ids: Vec<UnitId> = (0..10).map(|i| map.insert(i)).collect();
    map.remove(ids[3]);
    map.remove(ids[7]);
    let seen: Vec<u32> = map.iter().map(|(_, v)| *v).collect();
    assert_eq!(seen, vec![0, 1, 2, 4, 5, 6, 8, 9]);
}

#[test]
#[should_panic]
fn vec_map_get_of_dead_id_panics() {
    let mut map: VecMap<UnitId, u32> = VecMap::new();
    let a = map.insert(1);
    map.remove(a);
    map.get(a);
}

#[test]
fn grid_round_trips_cells() {
    let mut grid = Grid::new(4, 3, 0u8);
    grid.set(2, 1, 7);
    assert_eq!(*grid.get(2, 1), 7);
    assert_eq!(*grid.get(0, 0), 0);
    assert!(grid.is_in_bounds(Point::new(3, 2)));
    assert!(!grid.is_in_bounds(Point::new(4, 0)));
    assert!(!grid.is_in_bounds(Point::new(-1, 0)));
}

#[test]
fn grid_from_fn_is_row_major() {
    let grid = Grid::from_fn(3, 2, |p| p.y * 10 + p.x);
    assert_eq!(*grid.get(0, 0), 0);
    assert_eq!(*grid.get(2, 0), 2);
    assert_eq!(*grid.get(0, 1), 10);
}

#[test]
fn grid_rect_queries_ignore_out_of_bounds_cells() {
    let grid = Grid::from_fn(4, 4, |p| p.x == 3 && p.y == 3);
    let rect = DiscreteRect::new(2, 2, 4, 4);
    assert!(grid.any_in_rect(&rect, |c| *c));
    let empty = DiscreteRect::new(-5, -5, 2, 2);
    assert!(!grid.any_in_rect(&empty, |c| *c));
}

#[test]
fn rect_perimeter_touching() {
    // A 2x2 rect at (5,5). A same-size footprint touches the perimeter when
    // its top-left sits on the ring around the rect.
    let rect = DiscreteRect::new(5, 5, 2, 2);
    assert!(rect.top_left_touches_perimeter(5, 4));
    assert!(rect.top_left_touches_perimeter(7, 5));
    assert!(rect.top_left_touches_perimeter(5, 7));
    assert!(!rect.top_left_touches_perimeter(6, 6));
    assert!(!rect.top_left_touches_perimeter(9, 9));
}

#[test]
fn rect_octile_distance_to_corner_splits_diagonal() {
    let rect = DiscreteRect::new(5, 5, 2, 2);
    let d = rect.octile_distance_to_top_left_touching(2, 1);
    // dx = 3, dy = 4 -> one straight step plus three diagonals
    assert_eq!(d.straight, 1);
    assert_eq!(d.diagonal, 3);
}

#[test]
fn rect_intersection() {
    let a = DiscreteRect::new(0, 0, 4, 4);
    let b = DiscreteRect::new(2, 2, 4, 4);
    assert_eq!(a.intersection(&b), Some(DiscreteRect::new(2, 2, 2, 2)));
    let c = DiscreteRect::new(10, 10, 2, 2);
    assert_eq!(a.intersection(&c), None);
}
