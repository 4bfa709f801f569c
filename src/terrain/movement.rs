//! Movement-class walkability.
//!
//! A movement class is a footprint plus slope and water-depth tolerances.
//! For each class in use, a bitgrid of "can this class stand with its
//! top-left corner here" answers is precomputed once per map; pathfinding
//! then queries it instead of re-deriving slopes.

use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;

use crate::collections::{Grid, Point};
use crate::data::MovementClassDefinition;
use crate::ids::MovementClassId;

use super::MapTerrain;

/// Highest and lowest corner within the 2×2 sample window at a cell.
fn get_slope(heights: &Grid<u8>, x: usize, y: usize) -> u32 {
    let mut min_height = u8::MAX;
    let mut max_height = u8::MIN;

    for dy in 0..2 {
        for dx in 0..2 {
            let cx = (x + dx).min(heights.width() - 1);
            let cy = (y + dy).min(heights.height() - 1);
            let h = *heights.get(cx, cy);
            min_height = min_height.min(h);
            max_height = max_height.max(h);
        }
    }

    u32::from(max_height - min_height)
}

fn get_water_depth(heights: &Grid<u8>, water_level: u32, x: usize, y: usize) -> u32 {
    let height = u32::from(*heights.get(x.min(heights.width() - 1), y.min(heights.height() - 1)));
    water_level.saturating_sub(height)
}

fn is_area_under_water(
    heights: &Grid<u8>,
    water_level: u32,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> bool {
    for dy in 0..=height {
        for dx in 0..=width {
            let cx = (x + dx).min(heights.width() - 1);
            let cy = (y + dy).min(heights.height() - 1);
            if u32::from(*heights.get(cx, cy)) < water_level {
                return true;
            }
        }
    }
    false
}

fn is_max_slope_exceeded(
    heights: &Grid<u8>,
    water_level: u32,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    max_slope: u32,
    max_water_slope: u32,
) -> bool {
    let under_water = is_area_under_water(heights, water_level, x, y, width, height);
    let effective_max_slope = if under_water {
        max_water_slope
    } else {
        max_slope
    };

    for dy in 0..height {
        for dx in 0..width {
            if get_slope(heights, x + dx, y + dy) > effective_max_slope {
                return true;
            }
        }
    }

    false
}

fn is_water_depth_within_bounds(
    heights: &Grid<u8>,
    water_level: u32,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    min_water_depth: u32,
    max_water_depth: u32,
) -> bool {
    for dy in 0..height {
        for dx in 0..width {
            let depth = get_water_depth(heights, water_level, x + dx, y + dy);
            if depth < min_water_depth || depth > max_water_depth {
                return false;
            }
        }
    }
    true
}

pub fn is_grid_point_walkable(
    terrain: &MapTerrain,
    movement_class: &MovementClassDefinition,
    x: usize,
    y: usize,
) -> bool {
    let heights = terrain.height_map();
    let water = terrain.sea_level_units();
    let w = movement_class.footprint_x as usize;
    let h = movement_class.footprint_z as usize;

    if is_max_slope_exceeded(
        heights,
        water,
        x,
        y,
        w,
        h,
        movement_class.max_slope,
        movement_class.max_water_slope,
    ) {
        return false;
    }

    if !is_water_depth_within_bounds(
        heights,
        water,
        x,
        y,
        w,
        h,
        movement_class.min_water_depth,
        movement_class.max_water_depth,
    ) {
        return false;
    }

    for dy in 0..h {
        for dx in 0..w {
            if terrain.is_void(Point::new((x + dx) as i32, (y + dy) as i32)) {
                return false;
            }
        }
    }

    true
}

/// Precomputed walkability answers for one movement class, one bit per cell.
#[derive(Clone, Debug)]
pub struct WalkabilityGrid {
    width: usize,
    height: usize,
    bits: FixedBitSet,
}

impl WalkabilityGrid {
    pub fn is_walkable(&self, p: Point) -> bool {
        if p.x < 0 || p.y < 0 {
            return false;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        x < self.width && y < self.height && self.bits.contains(y * self.width + x)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

pub fn compute_walkable_grid(
    terrain: &MapTerrain,
    movement_class: &MovementClassDefinition,
) -> WalkabilityGrid {
    // The grid is shrunk by the footprint so every set bit stands for a
    // fully in-bounds footprint placement.
    let width = terrain
        .width_in_cells()
        .saturating_sub(movement_class.footprint_x as usize)
        .max(1);
    let height = terrain
        .height_in_cells()
        .saturating_sub(movement_class.footprint_z as usize)
        .max(1);

    let mut bits = FixedBitSet::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            if is_grid_point_walkable(terrain, movement_class, x, y) {
                bits.insert(y * width + x);
            }
        }
    }

    WalkabilityGrid {
        width,
        height,
        bits,
    }
}

/// All precomputed walkability grids for the current map.
#[derive(Default)]
pub struct WalkabilityStore {
    grids: FxHashMap<MovementClassId, WalkabilityGrid>,
}

impl WalkabilityStore {
    pub fn register(&mut self, id: MovementClassId, grid: WalkabilityGrid) {
        self.grids.insert(id, grid);
    }

    pub fn is_walkable(&self, movement_class: MovementClassId, p: Point) -> bool {
        self.grids
            .get(&movement_class)
            .is_some_and(|g| g.is_walkable(p))
    }

    pub fn get(&self, movement_class: MovementClassId) -> Option<&WalkabilityGrid> {
        self.grids.get(&movement_class)
    }
}
