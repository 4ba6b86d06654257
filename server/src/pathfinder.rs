//! A* search over the tile grid
//!
//! Paths are computed on tiles, then cleaned up in world space:
//! - the first and last points are the exact requested origin and
//!   destination, so sub-tile precision is kept at both ends
//! - interior points sitting on a straight run are dropped
//! - remaining interior points are moved to their tile center

use crate::world::{Grid, Tile};
use log::debug;
use shared::{Path, Vec2};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Open-set entry ordered by estimated total cost, then by tile index so
/// that ties always resolve the same way.
#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f32,
    idx: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f.total_cmp(&other.f).then(self.idx.cmp(&other.idx))
    }
}

fn heuristic(a: Tile, b: Tile) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

#[derive(Debug, Clone)]
pub struct Pathfinder {
    grid: Arc<Grid>,
}

impl Pathfinder {
    pub fn new(grid: Arc<Grid>) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Searches for a path from `org` to `dst`, both in world coordinates.
    ///
    /// Returns `None` when either point lies outside the grid or no path
    /// exists. A returned path always holds at least two points, the first
    /// being `org` and the last `dst`.
    pub fn find_path(&self, org: Vec2, dst: Vec2) -> Option<Path> {
        let (Some(start), Some(goal)) = (self.grid.tile_at(org), self.grid.tile_at(dst)) else {
            debug!("Couldn't find origin or destination tile: {:?} -> {:?}", org, dst);
            return None;
        };

        let raw = self.search(start, goal)?;
        Some(self.smooth(&raw, org, dst))
    }

    /// Plain A*; returns the tiles from `start` to `goal`, both included.
    fn search(&self, start: Tile, goal: Tile) -> Option<Vec<Tile>> {
        let grid = &*self.grid;
        if !grid.is_walkable(start) || !grid.is_walkable(goal) {
            return None;
        }

        let count = grid.tile_count();
        let mut g_score = vec![f32::INFINITY; count];
        let mut came_from: Vec<Option<usize>> = vec![None; count];
        let mut closed = vec![false; count];
        let mut open = BinaryHeap::new();

        let start_idx = grid.idx(start);
        let goal_idx = grid.idx(goal);
        g_score[start_idx] = 0.0;
        open.push(Reverse(OpenNode {
            f: heuristic(start, goal),
            idx: start_idx,
        }));

        while let Some(Reverse(OpenNode { idx, .. })) = open.pop() {
            if idx == goal_idx {
                let mut tiles = vec![goal];
                let mut current = idx;
                while let Some(prev) = came_from[current] {
                    tiles.push(grid.tile_from_idx(prev));
                    current = prev;
                }
                tiles.reverse();
                return Some(tiles);
            }
            if closed[idx] {
                continue;
            }
            closed[idx] = true;

            let tile = grid.tile_from_idx(idx);
            for (next, cost) in grid.neighbors(tile) {
                let next_idx = grid.idx(next);
                if closed[next_idx] {
                    continue;
                }
                let tentative = g_score[idx] + cost;
                if tentative < g_score[next_idx] {
                    g_score[next_idx] = tentative;
                    came_from[next_idx] = Some(idx);
                    open.push(Reverse(OpenNode {
                        f: tentative + heuristic(next, goal),
                        idx: next_idx,
                    }));
                }
            }
        }
        None
    }

    fn smooth(&self, raw: &[Tile], org: Vec2, dst: Vec2) -> Path {
        let mut path = Vec::with_capacity(raw.len().max(2));
        path.push(org);
        for i in 1..raw.len().saturating_sub(1) {
            let (prev, cur, next) = (raw[i - 1], raw[i], raw[i + 1]);
            let dir_in = (cur.x - prev.x, cur.y - prev.y);
            let dir_out = (next.x - cur.x, next.y - cur.y);
            if dir_in == dir_out {
                continue;
            }
            path.push(self.grid.tile_center(cur));
        }
        path.push(dst);
        path
    }
}
