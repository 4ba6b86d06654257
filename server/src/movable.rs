use shared::{Aabb, Path, Vec2, ENTITY_RADIUS};
use std::collections::VecDeque;
use std::time::Duration;

/// Position, speed and the path an entity is currently following.
///
/// Waypoints are consumed front to back; the destination is reached once
/// the path is empty.
#[derive(Debug, Clone)]
pub struct Movable {
    pub pos: Vec2,
    pub speed: f32,
    path: VecDeque<Vec2>,
}

impl Movable {
    pub fn new(pos: Vec2, speed: f32) -> Self {
        Self {
            pos,
            speed,
            path: VecDeque::new(),
        }
    }

    /// Replaces the current path; the previous one is discarded.
    pub fn set_path(&mut self, path: Path) {
        self.path = path.into();
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
    }

    pub fn has_reached_destination(&self) -> bool {
        self.path.is_empty()
    }

    /// First `max` waypoints still ahead.
    pub fn remaining_path(&self, max: usize) -> Vec<Vec2> {
        self.path.iter().take(max).copied().collect()
    }

    /// Position reached after moving for `dt` along the path, and the
    /// number of waypoints passed on the way. Does not mutate anything.
    pub fn compute_move(&self, dt: Duration) -> (Vec2, usize) {
        let mut budget = self.speed * dt.as_secs_f32();
        let mut pos = self.pos;
        let mut consumed = 0;

        for &waypoint in &self.path {
            let dist = pos.distance(waypoint);
            if dist <= budget {
                budget -= dist;
                pos = waypoint;
                consumed += 1;
            } else {
                pos = pos + (waypoint - pos).normalize().scale(budget);
                break;
            }
        }
        (pos, consumed)
    }

    /// Commits the move computed by [`Movable::compute_move`].
    /// Returns true if the position changed.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let (next, consumed) = self.compute_move(dt);
        self.path.drain(..consumed);
        let moved = next != self.pos;
        self.pos = next;
        moved
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_circle(self.pos, ENTITY_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_no_path_means_no_move() {
        let mut movable = Movable::new(Vec2::new(1.0, 1.0), 3.0);
        assert!(movable.has_reached_destination());
        assert!(!movable.advance(Duration::from_secs(1)));
        assert_eq!(movable.pos, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_partial_move_along_segment() {
        let mut movable = Movable::new(Vec2::ZERO, 2.0);
        movable.set_path(vec![Vec2::ZERO, Vec2::new(10.0, 0.0)]);

        assert!(movable.advance(Duration::from_millis(500)));
        assert_approx_eq!(movable.pos.x, 1.0);
        assert_approx_eq!(movable.pos.y, 0.0);
        assert!(!movable.has_reached_destination());
        assert_eq!(movable.remaining_path(3), vec![Vec2::new(10.0, 0.0)]);
    }

    #[test]
    fn test_move_passes_several_waypoints() {
        let mut movable = Movable::new(Vec2::ZERO, 1.0);
        movable.set_path(vec![
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(3.0, 1.0),
        ]);

        let (next, consumed) = movable.compute_move(Duration::from_millis(2500));
        assert_eq!(consumed, 2);
        assert_approx_eq!(next.x, 1.5);
        assert_approx_eq!(next.y, 1.0);
        assert_eq!(movable.pos, Vec2::ZERO);

        movable.advance(Duration::from_millis(2500));
        assert_eq!(movable.remaining_path(5), vec![Vec2::new(3.0, 1.0)]);
    }

    #[test]
    fn test_destination_is_reached_exactly() {
        let mut movable = Movable::new(Vec2::ZERO, 5.0);
        let dst = Vec2::new(3.0, 4.0);
        movable.set_path(vec![Vec2::ZERO, dst]);

        movable.advance(Duration::from_secs(2));
        assert_eq!(movable.pos, dst);
        assert!(movable.has_reached_destination());
    }

    #[test]
    fn test_new_path_replaces_old_one() {
        let mut movable = Movable::new(Vec2::ZERO, 1.0);
        movable.set_path(vec![Vec2::new(5.0, 0.0), Vec2::new(5.0, 5.0)]);
        movable.set_path(vec![Vec2::new(0.0, 2.0)]);
        assert_eq!(movable.remaining_path(10), vec![Vec2::new(0.0, 2.0)]);
    }
}
