//! Per-step constants record shared by every backend

use bytemuck::{Pod, Zeroable};
use particle_physics::{BoundaryShape, SimulationConfig};

/// `boundary_kind` value for the domain rectangle
pub const BOUNDARY_BOX: u32 = 0;
/// `boundary_kind` value for the circular container
pub const BOUNDARY_CIRCLE: u32 = 1;

/// Immutable snapshot of the step parameters, re-derived every step.
///
/// Matches the WGSL `Constants` uniform: scalars only, 80 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct StepConstants {
    // Counts
    pub num_particles: u32,
    pub num_indices: u32,
    pub num_offsets: u32,
    pub grid_width: u32,
    pub grid_height: u32,

    // Domain
    pub cell_size: f32,
    pub width: f32,
    pub height: f32,

    // Integration
    pub dt: f32,
    pub gravity_x: f32,
    pub gravity_y: f32,

    // Response
    pub dampening: f32,
    pub collision_response: f32,

    // Boundary: kind 0 box, 1 circle
    pub boundary_kind: u32,
    pub circle_center_x: f32,
    pub circle_center_y: f32,
    pub circle_radius: f32,

    pub _padding: [u32; 3],
}

impl StepConstants {
    /// Snapshot for `num_particles` particles stepping by `dt`
    pub fn derive(config: &SimulationConfig, num_particles: usize, dt: f32) -> Self {
        let domain = &config.domain;
        let (boundary_kind, center, radius) = match config.boundary {
            BoundaryShape::Box => (BOUNDARY_BOX, domain.center(), 0.0),
            BoundaryShape::Circle { center, radius } => (BOUNDARY_CIRCLE, center, radius),
        };

        Self {
            num_particles: num_particles as u32,
            num_indices: num_particles as u32,
            num_offsets: (domain.num_cells() + 1) as u32,
            grid_width: domain.grid_width() as u32,
            grid_height: domain.grid_height() as u32,
            cell_size: domain.cell_size,
            width: domain.width,
            height: domain.height,
            dt,
            gravity_x: config.gravity.x,
            gravity_y: config.gravity.y,
            dampening: config.dampening,
            collision_response: config.collision_response,
            boundary_kind,
            circle_center_x: center.x,
            circle_center_y: center.y,
            circle_radius: radius,
            _padding: [0; 3],
        }
    }

    #[inline]
    pub fn gravity(&self) -> glam::Vec2 {
        glam::Vec2::new(self.gravity_x, self.gravity_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use particle_physics::DomainConfig;

    #[test]
    fn record_is_uniform_sized() {
        assert_eq!(std::mem::size_of::<StepConstants>(), 80);
        assert_eq!(std::mem::size_of::<StepConstants>() % 16, 0);
    }

    #[test]
    fn derive_tracks_counts_and_domain() {
        let config = SimulationConfig::default().with_domain(DomainConfig::new(120.0, 60.0, 6.0));
        let c = StepConstants::derive(&config, 42, 0.5);

        assert_eq!(c.num_particles, 42);
        assert_eq!(c.num_indices, 42);
        assert_eq!(c.grid_width, 20);
        assert_eq!(c.grid_height, 10);
        assert_eq!(c.num_offsets, 201);
        assert_eq!(c.dt, 0.5);
        assert_eq!(c.boundary_kind, BOUNDARY_BOX);
        assert_eq!(c.gravity(), config.gravity);
    }

    #[test]
    fn derive_encodes_circle_boundary() {
        let config = SimulationConfig::default().with_boundary(BoundaryShape::Circle {
            center: Vec2::new(10.0, 20.0),
            radius: 7.0,
        });
        let c = StepConstants::derive(&config, 0, 1.0);
        assert_eq!(c.boundary_kind, BOUNDARY_CIRCLE);
        assert_eq!(
            (c.circle_center_x, c.circle_center_y, c.circle_radius),
            (10.0, 20.0, 7.0)
        );
    }
}
