//! Execution backends for one simulation step
//!
//! Every backend runs the same phases in the same order:
//!
//! ```text
//! upload_state → integrate → resolve_collisions → apply_boundary → download_state
//! ```
//!
//! A backend may fuse or offload phases but never reorder them.

use particle_physics::{
    BoundaryConstraint, BoundaryShape, CollisionSolver, DomainConfig, Particle, SpatialGrid,
    ThreadPool,
};

use crate::error::Result;
use crate::params::{StepConstants, BOUNDARY_CIRCLE};

pub trait ComputeBackend {
    /// Short name for logs
    fn label(&self) -> &'static str;

    /// Whether the backend consumes a grid built by the caller before upload.
    ///
    /// Backends returning `false` rebuild the grid themselves in
    /// [`ComputeBackend::resolve_collisions`].
    fn uses_host_grid(&self) -> bool {
        true
    }

    /// Phase 1: take the current particles, grid and constants
    fn upload_state(
        &mut self,
        particles: &[Particle],
        grid: &SpatialGrid,
        constants: &StepConstants,
    ) -> Result<()>;

    /// Phase 2: accumulate gravity and advance every particle
    fn integrate(&mut self, particles: &mut [Particle]);

    /// Phase 3: push overlapping particles apart
    fn resolve_collisions(&mut self, particles: &mut [Particle], grid: &mut SpatialGrid);

    /// Phase 4: keep particles inside the boundary
    fn apply_boundary(&mut self, particles: &mut [Particle]);

    /// Bring the results back into the host store
    fn download_state(&mut self, particles: &mut [Particle]) -> Result<()>;
}

/// Reference backend running every phase on a fixed worker pool
pub struct CpuBackend {
    pool: ThreadPool,
    constants: StepConstants,
}

impl CpuBackend {
    pub fn new(pool: ThreadPool) -> Self {
        Self {
            pool,
            constants: bytemuck::Zeroable::zeroed(),
        }
    }

    /// Pool sized at `multiplier` workers per hardware thread
    pub fn with_multiplier(multiplier: usize) -> Result<Self> {
        let pool = ThreadPool::with_multiplier(multiplier)?;
        log::info!("CPU backend using {} workers", pool.workers());
        Ok(Self::new(pool))
    }

    fn domain(&self) -> DomainConfig {
        DomainConfig::new(self.constants.width, self.constants.height, self.constants.cell_size)
    }

    fn boundary(&self) -> BoundaryConstraint {
        let c = &self.constants;
        let shape = if c.boundary_kind == BOUNDARY_CIRCLE {
            BoundaryShape::Circle {
                center: glam::Vec2::new(c.circle_center_x, c.circle_center_y),
                radius: c.circle_radius,
            }
        } else {
            BoundaryShape::Box
        };
        BoundaryConstraint::new(shape, &self.domain(), c.dampening)
    }
}

impl ComputeBackend for CpuBackend {
    fn label(&self) -> &'static str {
        "cpu"
    }

    fn uses_host_grid(&self) -> bool {
        false
    }

    fn upload_state(
        &mut self,
        _particles: &[Particle],
        _grid: &SpatialGrid,
        constants: &StepConstants,
    ) -> Result<()> {
        // particles stay in the host store
        self.constants = *constants;
        Ok(())
    }

    fn integrate(&mut self, particles: &mut [Particle]) {
        let gravity = self.constants.gravity();
        let dt = self.constants.dt;
        self.pool.for_each_chunk_mut(particles, |_, chunk| {
            for p in chunk {
                p.accelerate(gravity);
                p.integrate(dt);
            }
        });
    }

    fn resolve_collisions(&mut self, particles: &mut [Particle], grid: &mut SpatialGrid) {
        let domain = self.domain();
        grid.rebuild_with(&self.pool, particles, &domain);
        CollisionSolver::new(self.constants.collision_response).solve_parallel(
            &self.pool,
            particles,
            grid,
        );
    }

    fn apply_boundary(&mut self, particles: &mut [Particle]) {
        self.boundary().apply_parallel(&self.pool, particles);
    }

    fn download_state(&mut self, _particles: &mut [Particle]) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use particle_physics::SimulationConfig;

    fn backend() -> CpuBackend {
        CpuBackend::new(ThreadPool::new(2).unwrap())
    }

    #[test]
    fn integrate_applies_gravity_from_constants() {
        let config = SimulationConfig::default().with_gravity(Vec2::new(0.0, 2.0));
        let mut particles = vec![Particle::new(Vec2::new(50.0, 50.0), 1.0); 5];
        let grid = SpatialGrid::new(&config.domain);
        let mut cpu = backend();

        cpu.upload_state(&particles, &grid, &StepConstants::derive(&config, 5, 0.5))
            .unwrap();
        cpu.integrate(&mut particles);

        for p in &particles {
            assert_eq!(p.position(), Vec2::new(50.0, 50.5));
            assert_eq!(p.acceleration(), Vec2::ZERO);
        }
    }

    #[test]
    fn collisions_rebuild_the_grid_first() {
        let config = SimulationConfig::default();
        let mut particles = vec![
            Particle::new(Vec2::new(100.0, 100.0), 3.0),
            Particle::new(Vec2::new(104.0, 100.0), 3.0),
        ];
        // deliberately empty grid
        let mut grid = SpatialGrid::new(&config.domain);
        let mut cpu = backend();
        cpu.upload_state(&particles, &grid, &StepConstants::derive(&config, 2, 1.0))
            .unwrap();
        cpu.resolve_collisions(&mut particles, &mut grid);

        assert_eq!(grid.particle_count(), 2);
        assert!(particles[0].position().distance(particles[1].position()) > 4.0);
    }

    #[test]
    fn boundary_follows_uploaded_shape() {
        let domain = DomainConfig::new(100.0, 100.0, 10.0);
        let config = SimulationConfig::default()
            .with_domain(domain)
            .with_boundary(BoundaryShape::circle_in(&domain, 30.0));
        let mut particles = vec![Particle::new(Vec2::new(95.0, 50.0), 2.0)];
        let grid = SpatialGrid::new(&domain);
        let mut cpu = backend();
        cpu.upload_state(&particles, &grid, &StepConstants::derive(&config, 1, 1.0))
            .unwrap();
        cpu.apply_boundary(&mut particles);

        assert!((particles[0].position().x - 78.0).abs() < 1e-4);
    }
}
