//! Math types.
//!
//! This module intentionally stays small and deterministic.
//! Everything is `f64` so poses compare bit-for-bit with what goes on the wire.

use serde::{Deserialize, Serialize};

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector of length `speed` pointing along `rotation` radians.
    pub fn from_rotation(rotation: f64, speed: f64) -> Self {
        Self::new(rotation.cos() * speed, rotation.sin() * speed)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    pub fn len_sq(self) -> f64 {
        self.dot(self)
    }

    pub fn distance_sq(self, rhs: Self) -> f64 {
        Self::new(self.x - rhs.x, self.y - rhs.y).len_sq()
    }
}

/// Wraps `value` into the half-open range `[min, max)`.
pub fn wrap(value: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range <= 0.0 {
        return min;
    }
    min + ((value - min) % range + range) % range
}

/// Moves `value` toward zero by `amount`, stopping at zero.
pub fn approach_zero(value: f64, amount: f64) -> f64 {
    if value - amount > 0.0 {
        value - amount
    } else if value + amount < 0.0 {
        value + amount
    } else {
        0.0
    }
}
