use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Represents a vector in 2D world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the distance between two points.
    pub fn distance(&self, other: Vec2) -> f32 {
        (other - *self).length()
    }

    ///Returns the normalized vector, or the zero vector if it has no length.
    pub fn normalize(&self) -> Vec2 {
        let len = self.length();
        if len == 0.0 {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, scalar: f32) -> Vec2 {
        self.scale(scalar)
    }
}

/// Axis-aligned bounding box used for overlap queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    /// Smallest box enclosing the circle of the given center and radius.
    pub fn from_circle(center: Vec2, radius: f32) -> Self {
        Self {
            min: Vec2::new(center.x - radius, center.y - radius),
            max: Vec2::new(center.x + radius, center.y + radius),
        }
    }

    /// Boxes that only touch along an edge do not overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        !(self.max.x <= other.min.x
            || other.max.x <= self.min.x
            || self.max.y <= other.min.y
            || other.max.y <= self.min.y)
    }
}

/// Ordered waypoints, consumed front to back.
pub type Path = Vec<Vec2>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_length_and_distance() {
        let v = Vec2::new(3.0, 4.0);
        assert_approx_eq!(v.length(), 5.0);
        assert_approx_eq!(Vec2::ZERO.distance(v), 5.0);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);

        let n = Vec2::new(0.0, -2.0).normalize();
        assert_approx_eq!(n.x, 0.0);
        assert_approx_eq!(n.y, -1.0);
    }

    #[test]
    fn test_vector_operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(0.5, -1.0);
        assert_eq!(a + b, Vec2::new(1.5, 1.0));
        assert_eq!(a - b, Vec2::new(0.5, 3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::from_circle(Vec2::new(0.0, 0.0), 0.5);
        let b = Aabb::from_circle(Vec2::new(0.8, 0.2), 0.5);
        let c = Aabb::from_circle(Vec2::new(3.0, 3.0), 0.5);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_aabb_exact_touch_is_not_overlap() {
        let a = Aabb::from_circle(Vec2::new(0.0, 0.0), 0.5);
        let b = Aabb::from_circle(Vec2::new(1.0, 0.0), 0.5);
        assert!(!a.intersects(&b));
    }
}
