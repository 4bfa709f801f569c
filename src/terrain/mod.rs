//! The immutable map terrain: heightmap, tile attributes, sea level.
//!
//! Terrain never changes during a game. Everything dynamic (occupation,
//! features, yard maps) lives in the simulation's own grids, keyed to the
//! same cell coordinates.

use serde::{Deserialize, Serialize};

use crate::collections::{Grid, Point};
use crate::fixed_math::{SimScalar, SimVector};

pub use movement::{compute_walkable_grid, WalkabilityGrid, WalkabilityStore};

pub mod movement;

/// World units covered by one terrain cell along each horizontal axis.
pub const CELL_WORLD_SIZE: i64 = 16;

// Tile flags are a plain u8; only the void bit matters to the simulation
// (units may never stand on void tiles, regardless of movement class).
pub const TILE_FLAG_VOID: u8 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileAttributes {
    /// Index into the map's tile graphic table; opaque to the simulation,
    /// the renderer resolves it.
    pub graphic: u16,
    pub flags: u8,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapTerrain {
    /// One byte of height per half-tile corner.
    heights: Grid<u8>,
    tiles: Grid<TileAttributes>,
    sea_level: SimScalar,
}

impl MapTerrain {
    pub fn new(heights: Grid<u8>, tiles: Grid<TileAttributes>, sea_level: SimScalar) -> Self {
        Self {
            heights,
            tiles,
            sea_level,
        }
    }

    /// A flat map for tests and benchmarks.
    pub fn flat(width: usize, height: usize) -> Self {
        Self {
            heights: Grid::new(width, height, 0),
            tiles: Grid::new(width, height, TileAttributes::default()),
            sea_level: SimScalar::ZERO,
        }
    }

    pub fn height_map(&self) -> &Grid<u8> {
        &self.heights
    }

    pub fn tiles(&self) -> &Grid<TileAttributes> {
        &self.tiles
    }

    pub fn sea_level(&self) -> SimScalar {
        self.sea_level
    }

    pub fn sea_level_units(&self) -> u32 {
        self.sea_level.to_num::<i64>().max(0) as u32
    }

    pub fn width_in_cells(&self) -> usize {
        self.heights.width()
    }

    pub fn height_in_cells(&self) -> usize {
        self.heights.height()
    }

    pub fn world_to_cell(&self, position: SimVector) -> Point {
        let cell = SimScalar::from_num(CELL_WORLD_SIZE);
        Point::new(
            (position.x / cell).floor().to_num::<i64>() as i32,
            (position.z / cell).floor().to_num::<i64>() as i32,
        )
    }

    /// World position of a cell's top-left corner on the ground plane.
    pub fn cell_to_world(&self, cell: Point) -> SimVector {
        let size = SimScalar::from_num(CELL_WORLD_SIZE);
        SimVector::new(
            SimScalar::from_num(cell.x) * size,
            SimScalar::ZERO,
            SimScalar::from_num(cell.y) * size,
        )
    }

    /// World position of a footprint's centre given its top-left cell.
    pub fn footprint_center_to_world(&self, top_left: Point, width: u32, height: u32) -> SimVector {
        let size = SimScalar::from_num(CELL_WORLD_SIZE);
        let two = SimScalar::from_num(2);
        let mut p = self.cell_to_world(top_left);
        p.x += SimScalar::from_num(width) * size / two;
        p.z += SimScalar::from_num(height) * size / two;
        p.y = self.get_height_at(p.x, p.z);
        p
    }

    fn corner_height(&self, x: i64, z: i64) -> SimScalar {
        let cx = x.clamp(0, self.heights.width() as i64 - 1) as usize;
        let cz = z.clamp(0, self.heights.height() as i64 - 1) as usize;
        SimScalar::from_num(*self.heights.get(cx, cz))
    }

    /// Ground height at a world point, bilinearly interpolated between the
    /// four surrounding height samples. Pure fixed-point, so identical on
    /// every peer.
    pub fn get_height_at(&self, x: SimScalar, z: SimScalar) -> SimScalar {
        let cell = SimScalar::from_num(CELL_WORLD_SIZE);
        let fx = x / cell;
        let fz = z / cell;
        let ix = fx.floor().to_num::<i64>();
        let iz = fz.floor().to_num::<i64>();
        let tx = fx - fx.floor();
        let tz = fz - fz.floor();

        let h00 = self.corner_height(ix, iz);
        let h10 = self.corner_height(ix + 1, iz);
        let h01 = self.corner_height(ix, iz + 1);
        let h11 = self.corner_height(ix + 1, iz + 1);

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    pub fn is_void(&self, cell: Point) -> bool {
        self.tiles
            .try_get(cell)
            .is_none_or(|t| t.flags & TILE_FLAG_VOID != 0)
    }
}
