//! Physics abstraction.
//!
//! [`MotionBackend`] is the capability set the client core drives: it never
//! integrates motion itself, it only sets controls and reads poses back.
//! [`ArcadeMotion`] is a small arcade-style kinematic implementation of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::{approach_zero, wrap, Vec2};

/// Opaque handle to a body owned by a motion backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u64);

/// Position and rotation (radians) of a body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
}

/// Construction parameters for a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDesc {
    /// Linear drag in units/s², applied only while acceleration is zero.
    pub drag: f64,
    /// Angular drag in degrees/s².
    pub angular_drag: f64,
    /// Per-axis velocity clamp.
    pub max_velocity: f64,
    /// Collision radius used by [`MotionBackend::overlaps`].
    pub radius: f64,
}

impl BodyDesc {
    /// The locally controlled craft.
    pub const CRAFT: Self = Self {
        drag: 100.0,
        angular_drag: 100.0,
        max_velocity: 200.0,
        radius: 20.0,
    };

    /// The collectible star.
    pub const STAR: Self = Self {
        drag: 0.0,
        angular_drag: 0.0,
        max_velocity: 10_000.0,
        radius: 12.0,
    };
}

/// World rectangle used for wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }
}

/// Motion service consumed by the client core.
pub trait MotionBackend {
    fn spawn_body(&mut self, pose: Pose, desc: BodyDesc) -> BodyId;
    fn despawn_body(&mut self, body: BodyId);

    fn pose(&self, body: BodyId) -> Option<Pose>;
    fn velocity(&self, body: BodyId) -> Option<Vec2>;
    fn acceleration(&self, body: BodyId) -> Option<Vec2>;

    fn set_position(&mut self, body: BodyId, x: f64, y: f64);
    fn set_rotation(&mut self, body: BodyId, rotation: f64);

    /// Angular velocity in degrees per second.
    fn set_angular_velocity(&mut self, body: BodyId, rate: f64);
    /// Sets acceleration to `magnitude` along `direction` radians.
    fn set_acceleration_from_rotation(&mut self, body: BodyId, direction: f64, magnitude: f64);
    fn clear_acceleration(&mut self, body: BodyId);

    /// Re-enters a body from the opposite edge once it leaves the world
    /// bounds grown by `margin` on every side.
    fn wrap_to_bounds(&mut self, body: BodyId, margin: f64);

    fn overlaps(&self, a: BodyId, b: BodyId) -> bool;

    /// Advances every body by `dt_sec`.
    fn step(&mut self, dt_sec: f64);
}

#[derive(Debug, Clone)]
struct Body {
    position: Vec2,
    rotation: f64,
    velocity: Vec2,
    acceleration: Vec2,
    angular_velocity: f64,
    desc: BodyDesc,
}

/// Arcade-style kinematics over a bounded 2D world.
#[derive(Debug)]
pub struct ArcadeMotion {
    bounds: Bounds,
    next_id: u64,
    bodies: HashMap<BodyId, Body>,
}

impl ArcadeMotion {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            next_id: 0,
            bodies: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn set_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.velocity = velocity;
        }
    }

    pub fn angular_velocity(&self, body: BodyId) -> Option<f64> {
        self.bodies.get(&body).map(|b| b.angular_velocity)
    }
}

impl MotionBackend for ArcadeMotion {
    fn spawn_body(&mut self, pose: Pose, desc: BodyDesc) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id += 1;
        self.bodies.insert(
            id,
            Body {
                position: Vec2::new(pose.x, pose.y),
                rotation: pose.rotation,
                velocity: Vec2::ZERO,
                acceleration: Vec2::ZERO,
                angular_velocity: 0.0,
                desc,
            },
        );
        id
    }

    fn despawn_body(&mut self, body: BodyId) {
        self.bodies.remove(&body);
    }

    fn pose(&self, body: BodyId) -> Option<Pose> {
        self.bodies.get(&body).map(|b| Pose {
            x: b.position.x,
            y: b.position.y,
            rotation: b.rotation,
        })
    }

    fn velocity(&self, body: BodyId) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.velocity)
    }

    fn acceleration(&self, body: BodyId) -> Option<Vec2> {
        self.bodies.get(&body).map(|b| b.acceleration)
    }

    fn set_position(&mut self, body: BodyId, x: f64, y: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.position = Vec2::new(x, y);
        }
    }

    fn set_rotation(&mut self, body: BodyId, rotation: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.rotation = rotation;
        }
    }

    fn set_angular_velocity(&mut self, body: BodyId, rate: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.angular_velocity = rate;
        }
    }

    fn set_acceleration_from_rotation(&mut self, body: BodyId, direction: f64, magnitude: f64) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.acceleration = Vec2::from_rotation(direction, magnitude);
        }
    }

    fn clear_acceleration(&mut self, body: BodyId) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.acceleration = Vec2::ZERO;
        }
    }

    fn wrap_to_bounds(&mut self, body: BodyId, margin: f64) {
        let bounds = self.bounds;
        if let Some(b) = self.bodies.get_mut(&body) {
            b.position.x = wrap(
                b.position.x,
                bounds.x - margin,
                bounds.x + bounds.width + margin,
            );
            b.position.y = wrap(
                b.position.y,
                bounds.y - margin,
                bounds.y + bounds.height + margin,
            );
        }
    }

    fn overlaps(&self, a: BodyId, b: BodyId) -> bool {
        match (self.bodies.get(&a), self.bodies.get(&b)) {
            (Some(a), Some(b)) => {
                let reach = a.desc.radius + b.desc.radius;
                a.position.distance_sq(b.position) < reach * reach
            }
            _ => false,
        }
    }

    fn step(&mut self, dt_sec: f64) {
        for b in self.bodies.values_mut() {
            if b.acceleration == Vec2::ZERO {
                b.velocity.x = approach_zero(b.velocity.x, b.desc.drag * dt_sec);
                b.velocity.y = approach_zero(b.velocity.y, b.desc.drag * dt_sec);
            } else {
                b.velocity.x += b.acceleration.x * dt_sec;
                b.velocity.y += b.acceleration.y * dt_sec;
            }
            let max = b.desc.max_velocity;
            b.velocity.x = b.velocity.x.clamp(-max, max);
            b.velocity.y = b.velocity.y.clamp(-max, max);

            b.angular_velocity = approach_zero(b.angular_velocity, b.desc.angular_drag * dt_sec);

            b.position.x += b.velocity.x * dt_sec;
            b.position.y += b.velocity.y * dt_sec;
            b.rotation += b.angular_velocity.to_radians() * dt_sec;
        }
    }
}
