use serde::{Deserialize, Serialize};
use simulation_common::{BodySample, Vec2};

/// A circular body moving through the arena.
///
/// Velocity is kept decomposed as `direction * speed`; collision response
/// recombines it, works on the full vector and splits it again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec2,
    /// Expected to be unit length, not enforced.
    pub direction: Vec2,
    pub speed: f32,
    pub radius: f32,
}

impl Body {
    pub fn new(position: Vec2, direction: Vec2, speed: f32, radius: f32) -> Self {
        Body { position, direction, speed, radius }
    }

    #[inline(always)]
    pub fn velocity(&self) -> Vec2 {
        self.direction * self.speed
    }

    /// Splits `velocity` back into direction and speed.
    /// A zero velocity leaves the body at rest facing its previous direction.
    #[inline]
    pub fn set_velocity(&mut self, velocity: Vec2) {
        match velocity.try_normalize() {
            Some(direction) => {
                self.direction = direction;
                self.speed = velocity.length();
            }
            None => self.speed = 0.0,
        }
    }

    /// Radius doubles as mass.
    #[inline(always)]
    pub fn mass(&self) -> f32 {
        self.radius
    }

    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass() * self.velocity().length_squared()
    }

    /// Explicit Euler step: `position += direction * speed * dt`.
    #[inline(always)]
    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity() * dt;
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.direction.is_finite() && self.speed.is_finite()
    }

    pub fn sample(&self) -> BodySample {
        BodySample { x: self.position.x, y: self.position.y, radius: self.radius }
    }
}
