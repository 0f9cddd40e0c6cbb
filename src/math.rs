//! Minimal 2D vector type shared by spatial, ORCA, and pathfinding math.
//!
//! The teacher keeps raw `x`/`y` fields on `Position`/`Velocity` rather than
//! pulling in a vector-math crate; this crate follows that choice (no
//! `glam`/`nalgebra` dependency) but factors the handful of operations ORCA
//! and the resolver need into one small type instead of duplicating `f32`
//! arithmetic at every call site.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn dot(self, rhs: Vec2) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// 2D "cross product" (z-component of the 3D cross product).
    pub fn det(self, rhs: Vec2) -> f32 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > f32::EPSILON {
            self / len
        } else {
            Vec2::ZERO
        }
    }

    pub fn distance_to(self, rhs: Vec2) -> f32 {
        (self - rhs).length()
    }

    pub fn distance_sq_to(self, rhs: Vec2) -> f32 {
        (self - rhs).length_sq()
    }

    pub fn clamp_length(self, max: f32) -> Vec2 {
        let len = self.length();
        if len > max && len > f32::EPSILON {
            self * (max / len)
        } else {
            self
        }
    }

    pub fn rotated(self, radians: f32) -> Vec2 {
        let (s, c) = radians.sin_cos();
        Vec2::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    pub fn angle_to(self, rhs: Vec2) -> f32 {
        self.dot(rhs).clamp(-1.0, 1.0).acos()
            * if self.det(rhs) < 0.0 { -1.0 } else { 1.0 }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_zero_vector_is_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn clamp_length_preserves_direction() {
        let v = Vec2::new(10.0, 0.0).clamp_length(2.0);
        assert!((v.x - 2.0).abs() < 1e-5);
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn det_sign_matches_rotation_direction() {
        let a = Vec2::new(1.0, 0.0);
        let b = Vec2::new(0.0, 1.0);
        assert!(a.det(b) > 0.0);
        assert!(b.det(a) < 0.0);
    }
}
