//! Tile grid and spatial index
//!
//! The [`Grid`] is the static walkability map the pathfinder searches. It
//! never changes once the server is running, so it is shared read-only
//! with the movement planner through an `Arc`.
//!
//! The [`SpatialIndex`] tracks the bounding box of every live entity and
//! answers overlap queries for collision checks. It only stores entity ids
//! and kinds, never the entities themselves; it is owned and mutated by the
//! game loop alone.

use shared::{Aabb, EntityId, EntityKind, Vec2};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Edge length, in world units, of the buckets of the spatial index.
const INDEX_CELL_SIZE: f32 = 1.0;

/// Eight neighbors, cardinal directions first.
const NEIGHBORS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Integer coordinates of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
}

impl Tile {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Uniform grid of walkable or blocked tiles.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    scale: f32,
    walkable: Vec<bool>,
}

impl Grid {
    /// Creates a grid where every tile is walkable.
    pub fn open(width: u32, height: u32, scale: f32) -> Self {
        Self {
            width,
            height,
            scale,
            walkable: vec![true; (width as usize) * (height as usize)],
        }
    }

    /// Builds a grid from rows of characters, `#` being a blocked tile.
    ///
    /// The first row is `y = 0`. Rows shorter than the longest one are
    /// padded with walkable tiles.
    pub fn from_ascii(map: &str, scale: f32) -> Self {
        let rows: Vec<&str> = map.lines().filter(|l| !l.trim().is_empty()).collect();
        let width = rows.iter().map(|r| r.trim().chars().count()).max().unwrap_or(0) as u32;
        let height = rows.len() as u32;

        let mut grid = Grid::open(width, height, scale);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.trim().chars().enumerate() {
                if c == '#' {
                    let idx = y * width as usize + x;
                    grid.walkable[idx] = false;
                }
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Tiles per world unit.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Returns the tile at the given grid coordinates, if inside the grid.
    pub fn tile(&self, x: i32, y: i32) -> Option<Tile> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            None
        } else {
            Some(Tile::new(x, y))
        }
    }

    /// Maps a world position to the tile containing it.
    pub fn tile_at(&self, pos: Vec2) -> Option<Tile> {
        let scaled = pos.scale(self.scale);
        if !scaled.x.is_finite() || !scaled.y.is_finite() {
            return None;
        }
        self.tile(scaled.x.floor() as i32, scaled.y.floor() as i32)
    }

    /// World position of the center of a tile.
    pub fn tile_center(&self, tile: Tile) -> Vec2 {
        Vec2::new(tile.x as f32 + 0.5, tile.y as f32 + 0.5).scale(1.0 / self.scale)
    }

    pub fn contains(&self, pos: Vec2) -> bool {
        self.tile_at(pos).is_some()
    }

    pub fn is_walkable(&self, tile: Tile) -> bool {
        self.tile(tile.x, tile.y)
            .map(|t| self.walkable[self.idx(t)])
            .unwrap_or(false)
    }

    pub fn set_walkable(&mut self, tile: Tile, walkable: bool) {
        if let Some(t) = self.tile(tile.x, tile.y) {
            let idx = self.idx(t);
            self.walkable[idx] = walkable;
        }
    }

    /// Walkable neighbors of a tile with the cost of the step to each.
    ///
    /// Diagonal steps are only allowed when both adjacent cardinal tiles
    /// are walkable, so paths never cut a blocked corner.
    pub fn neighbors(&self, tile: Tile) -> impl Iterator<Item = (Tile, f32)> + '_ {
        NEIGHBORS.iter().filter_map(move |&(dx, dy)| {
            let next = self.tile(tile.x + dx, tile.y + dy)?;
            if !self.is_walkable(next) {
                return None;
            }
            if dx != 0 && dy != 0 {
                let side_a = Tile::new(tile.x + dx, tile.y);
                let side_b = Tile::new(tile.x, tile.y + dy);
                if !self.is_walkable(side_a) || !self.is_walkable(side_b) {
                    return None;
                }
                Some((next, std::f32::consts::SQRT_2))
            } else {
                Some((next, 1.0))
            }
        })
    }

    pub fn walkable_tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Tile::new(x, y)))
            .filter(move |t| self.is_walkable(*t))
    }

    pub(crate) fn idx(&self, tile: Tile) -> usize {
        tile.y as usize * self.width as usize + tile.x as usize
    }

    pub(crate) fn tile_count(&self) -> usize {
        self.walkable.len()
    }

    pub(crate) fn tile_from_idx(&self, idx: usize) -> Tile {
        Tile::new(
            (idx % self.width as usize) as i32,
            (idx / self.width as usize) as i32,
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    kind: EntityKind,
    bounds: Aabb,
}

/// Bucketed index of entity bounding boxes, keyed by entity id.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    cells: HashMap<(i32, i32), BTreeSet<EntityId>>,
    entries: HashMap<EntityId, IndexEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity, replacing any previous registration.
    pub fn insert(&mut self, id: EntityId, kind: EntityKind, bounds: Aabb) {
        self.remove(id);
        for cell in cells_covering(&bounds) {
            self.cells.entry(cell).or_default().insert(id);
        }
        self.entries.insert(id, IndexEntry { kind, bounds });
    }

    /// Moves an already registered entity. Returns false if it is unknown.
    pub fn update(&mut self, id: EntityId, bounds: Aabb) -> bool {
        match self.entries.get(&id).map(|e| e.kind) {
            Some(kind) => {
                self.insert(id, kind, bounds);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        for cell in cells_covering(&entry.bounds) {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Entities whose bounding box overlaps `area`, in ascending id order.
    pub fn query(&self, area: &Aabb) -> Vec<(EntityId, EntityKind)> {
        let candidates: BTreeSet<EntityId> = cells_covering(area)
            .filter_map(|cell| self.cells.get(&cell))
            .flat_map(|ids| ids.iter().copied())
            .collect();

        candidates
            .into_iter()
            .filter_map(|id| {
                let entry = self.entries.get(&id)?;
                entry.bounds.intersects(area).then_some((id, entry.kind))
            })
            .collect()
    }

    pub fn bounds(&self, id: EntityId) -> Option<Aabb> {
        self.entries.get(&id).map(|e| e.bounds)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn cells_covering(area: &Aabb) -> impl Iterator<Item = (i32, i32)> {
    let min_x = (area.min.x / INDEX_CELL_SIZE).floor() as i32;
    let min_y = (area.min.y / INDEX_CELL_SIZE).floor() as i32;
    let max_x = (area.max.x / INDEX_CELL_SIZE).floor() as i32;
    let max_y = (area.max.y / INDEX_CELL_SIZE).floor() as i32;
    (min_y..=max_y).flat_map(move |y| (min_x..=max_x).map(move |x| (x, y)))
}

/// Static grid plus the live entity index.
#[derive(Debug)]
pub struct World {
    pub grid: Arc<Grid>,
    pub index: SpatialIndex,
}

impl World {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid: Arc::new(grid),
            index: SpatialIndex::new(),
        }
    }
}
