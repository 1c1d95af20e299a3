//! Domain and simulation parameters
//!
//! The grid dimensions are derived from the domain at runtime, so several
//! simulations with different domains can coexist.

use glam::Vec2;

use crate::constants::*;
use crate::error::{PhysicsError, Result};

/// Simulation domain `[0, width) × [0, height)` partitioned into square cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainConfig {
    pub width: f32,
    pub height: f32,
    /// Cell edge length; must be at least the largest particle diameter
    pub cell_size: f32,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            width: DOMAIN_WIDTH,
            height: DOMAIN_HEIGHT,
            cell_size: CELL_SIZE,
        }
    }
}

impl DomainConfig {
    pub fn new(width: f32, height: f32, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("cell_size", self.cell_size),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Number of cell columns covering the domain
    #[inline]
    pub fn grid_width(&self) -> usize {
        ((self.width / self.cell_size).ceil() as usize).max(1)
    }

    /// Number of cell rows covering the domain
    #[inline]
    pub fn grid_height(&self) -> usize {
        ((self.height / self.cell_size).ceil() as usize).max(1)
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.grid_width() * self.grid_height()
    }

    #[inline]
    pub fn cell_index(&self, x: usize, y: usize) -> usize {
        x + y * self.grid_width()
    }

    /// Cell coordinates of a position, clamped onto the grid.
    ///
    /// Positions outside the domain land in the nearest edge cell.
    #[inline]
    pub fn cell_coords(&self, position: Vec2) -> (usize, usize) {
        let cx = (position.x / self.cell_size).floor();
        let cy = (position.y / self.cell_size).floor();
        // `as usize` saturates negatives and NaN to 0
        let cx = (cx as usize).min(self.grid_width() - 1);
        let cy = (cy as usize).min(self.grid_height() - 1);
        (cx, cy)
    }

    #[inline]
    pub fn cell_of(&self, position: Vec2) -> usize {
        let (x, y) = self.cell_coords(position);
        self.cell_index(x, y)
    }

    /// Reject particles too wide for the neighbour stencil to see their overlaps
    pub fn check_radius(&self, radius: f32) -> Result<()> {
        if 2.0 * radius > self.cell_size {
            return Err(PhysicsError::InvalidParticle(format!(
                "diameter {} exceeds cell size {}",
                2.0 * radius,
                self.cell_size
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * 0.5
    }
}

/// Containment shape applied at the end of every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryShape {
    /// The domain rectangle itself
    Box,
    /// Circle of `radius` around `center`
    Circle { center: Vec2, radius: f32 },
}

impl BoundaryShape {
    /// Circle centred in the domain
    pub fn circle_in(domain: &DomainConfig, radius: f32) -> Self {
        Self::Circle {
            center: domain.center(),
            radius,
        }
    }
}

/// Everything a simulation instance needs besides its particles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub domain: DomainConfig,
    pub gravity: Vec2,
    /// Fraction of velocity kept on boundary contact
    pub dampening: f32,
    /// Narrow-phase overlap correction factor
    pub collision_response: f32,
    pub boundary: BoundaryShape,
    /// Worker threads per hardware thread for the CPU backend
    pub worker_multiplier: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            domain: DomainConfig::default(),
            gravity: Vec2::from_array(GRAVITY),
            dampening: DAMPENING,
            collision_response: COLLISION_RESPONSE,
            boundary: BoundaryShape::Box,
            worker_multiplier: WORKER_MULTIPLIER,
        }
    }
}

impl SimulationConfig {
    pub fn with_domain(mut self, domain: DomainConfig) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec2) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_dampening(mut self, dampening: f32) -> Self {
        self.dampening = dampening;
        self
    }

    pub fn with_collision_response(mut self, response: f32) -> Self {
        self.collision_response = response;
        self
    }

    pub fn with_boundary(mut self, boundary: BoundaryShape) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_worker_multiplier(mut self, multiplier: usize) -> Self {
        self.worker_multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;

        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfig(
                "gravity must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("dampening", self.dampening),
            ("collision_response", self.collision_response),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {value}"
                )));
            }
        }
        if let BoundaryShape::Circle { center, radius } = self.boundary {
            if !center.is_finite() || !radius.is_finite() || radius <= 0.0 {
                return Err(PhysicsError::InvalidConfig(format!(
                    "circle boundary needs a finite center and radius > 0, got {center} / {radius}"
                )));
            }
        }
        if self.worker_multiplier == 0 {
            return Err(PhysicsError::InvalidConfig(
                "worker_multiplier must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
