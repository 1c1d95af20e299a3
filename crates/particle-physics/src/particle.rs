//! Point-mass particle and its Verlet integration step

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::constants::PARTICLE_MASS;
use crate::error::{PhysicsError, Result};

/// GPU-compatible particle structure
/// Aligned for WGSL struct compatibility (32 bytes, `vec2<f32>` fields)
///
/// Velocity is never stored: it is the difference between `position` and
/// `position_last`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Current position
    pub position: [f32; 2],
    /// Position at the previous step
    pub position_last: [f32; 2],
    /// Acceleration accumulated since the last integration
    pub acceleration: [f32; 2],
    /// Mass of the particle (> 0)
    pub mass: f32,
    /// Collision radius (> 0)
    pub radius: f32,
}

impl Particle {
    /// Create a particle at rest with unit mass
    pub fn new(position: Vec2, radius: f32) -> Self {
        Self {
            position: position.to_array(),
            position_last: position.to_array(),
            acceleration: [0.0; 2],
            mass: PARTICLE_MASS,
            radius,
        }
    }

    /// Create a particle already moving by `displacement` per step
    pub fn with_velocity(position: Vec2, displacement: Vec2, radius: f32) -> Self {
        Self {
            position_last: (position - displacement).to_array(),
            ..Self::new(position, radius)
        }
    }

    /// Override the mass
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Reject particles the solver cannot handle
    pub fn validate(&self) -> Result<()> {
        if self.mass.is_nan() || self.mass <= 0.0 {
            return Err(PhysicsError::InvalidParticle(format!(
                "mass must be > 0, got {}",
                self.mass
            )));
        }
        if self.radius.is_nan() || self.radius <= 0.0 {
            return Err(PhysicsError::InvalidParticle(format!(
                "radius must be > 0, got {}",
                self.radius
            )));
        }
        if !self.position().is_finite() || !self.position_last().is_finite() {
            return Err(PhysicsError::InvalidParticle(
                "position must be finite".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    #[inline]
    pub fn position_last(&self) -> Vec2 {
        Vec2::from_array(self.position_last)
    }

    #[inline]
    pub fn acceleration(&self) -> Vec2 {
        Vec2::from_array(self.acceleration)
    }

    #[inline]
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position.to_array();
    }

    /// Move the particle without touching `position_last`.
    ///
    /// The shift shows up as extra velocity on the next integration.
    #[inline]
    pub fn translate(&mut self, offset: Vec2) {
        self.set_position(self.position() + offset);
    }

    /// Accumulate an acceleration for the current step.
    ///
    /// Must be called before [`Particle::integrate`] within a step.
    #[inline]
    pub fn accelerate(&mut self, a: Vec2) {
        self.acceleration = (self.acceleration() + a).to_array();
    }

    /// Advance one step with position Verlet and clear the accumulated acceleration
    #[inline]
    pub fn integrate(&mut self, dt: f32) {
        let position = self.position();
        let displacement = position - self.position_last();
        self.position_last = self.position;
        self.position = (position + displacement + self.acceleration() * (dt * dt)).to_array();
        self.acceleration = [0.0; 2];
    }

    /// Per-step displacement, the velocity the boundary math works with
    #[inline]
    pub fn displacement(&self) -> Vec2 {
        self.position() - self.position_last()
    }

    /// Replace the per-step displacement, keeping the current position
    #[inline]
    pub fn set_displacement(&mut self, displacement: Vec2) {
        self.position_last = (self.position() - displacement).to_array();
    }

    /// Velocity in units per time for a step of `dt`
    #[inline]
    pub fn velocity(&self, dt: f32) -> Vec2 {
        self.displacement() / dt
    }

    pub fn set_velocity(&mut self, v: Vec2, dt: f32) {
        self.set_displacement(v * dt);
    }

    pub fn add_velocity(&mut self, v: Vec2, dt: f32) {
        self.position_last = (self.position_last() - v * dt).to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_wgsl_struct() {
        assert_eq!(std::mem::size_of::<Particle>(), 32);
    }

    #[test]
    fn uniform_motion_advances_by_displacement() {
        let delta = Vec2::new(0.5, -0.25);
        let mut p = Particle::with_velocity(Vec2::new(10.0, 20.0), delta, 1.0);
        let before = p.position();
        p.integrate(1.0);
        assert_eq!(p.position(), before + delta);
        assert_eq!(p.position_last(), before);
        p.integrate(0.5);
        assert_eq!(p.position(), before + delta * 2.0);
    }

    #[test]
    fn acceleration_is_applied_once_then_cleared() {
        let mut p = Particle::new(Vec2::new(0.0, 0.0), 1.0);
        p.accelerate(Vec2::new(0.0, 1.0));
        p.accelerate(Vec2::new(0.0, 1.0));
        p.integrate(2.0);
        assert_eq!(p.position(), Vec2::new(0.0, 8.0));
        assert_eq!(p.acceleration(), Vec2::ZERO);

        // velocity survives implicitly
        p.integrate(2.0);
        assert_eq!(p.position(), Vec2::new(0.0, 16.0));
    }

    #[test]
    fn velocity_helpers_rewrite_position_last() {
        let mut p = Particle::new(Vec2::new(5.0, 5.0), 1.0);
        p.set_velocity(Vec2::new(2.0, 0.0), 0.5);
        assert_eq!(p.position_last(), Vec2::new(4.0, 5.0));
        assert_eq!(p.velocity(0.5), Vec2::new(2.0, 0.0));

        p.add_velocity(Vec2::new(0.0, 4.0), 0.5);
        assert_eq!(p.displacement(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn validate_rejects_degenerate_particles() {
        assert!(Particle::new(Vec2::ZERO, 1.0).validate().is_ok());
        assert!(Particle::new(Vec2::ZERO, 0.0).validate().is_err());
        assert!(Particle::new(Vec2::ZERO, 1.0)
            .with_mass(-1.0)
            .validate()
            .is_err());
        assert!(Particle::new(Vec2::new(f32::NAN, 0.0), 1.0)
            .validate()
            .is_err());
    }
}
