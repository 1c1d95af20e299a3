//! Simulation engine: particle store plus an injected compute backend
//!
//! Per step:
//!
//! ```text
//! derive constants → (host grid rebuild) → upload → integrate → collide → contain → download
//! ```
//!
//! Backends that consume a host-built grid get it rebuilt from the current
//! positions right before upload; the CPU backend rebuilds inside its
//! collision phase instead, after integration. Either way the grid is
//! rebuilt exactly once per step.

use particle_physics::{Particle, SimulationConfig, SpatialGrid};

use crate::backend::{ComputeBackend, CpuBackend};
use crate::error::Result;
use crate::params::StepConstants;

pub struct Simulation {
    config: SimulationConfig,
    particles: Vec<Particle>,
    grid: SpatialGrid,
    backend: Box<dyn ComputeBackend>,
    steps: u64,
}

impl Simulation {
    pub fn new(config: SimulationConfig, backend: Box<dyn ComputeBackend>) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Initializing Simulation ({} backend, {}x{} domain, {}x{} grid)",
            backend.label(),
            config.domain.width,
            config.domain.height,
            config.domain.grid_width(),
            config.domain.grid_height()
        );
        Ok(Self {
            grid: SpatialGrid::new(&config.domain),
            config,
            particles: Vec::new(),
            backend,
            steps: 0,
        })
    }

    /// Simulation on the CPU reference backend
    pub fn cpu(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let backend = CpuBackend::with_multiplier(config.worker_multiplier)?;
        Self::new(config, Box::new(backend))
    }

    /// Append a particle to the store.
    ///
    /// Its diameter may not exceed the grid cell size.
    pub fn spawn(&mut self, particle: Particle) -> Result<()> {
        particle.validate()?;
        self.config.domain.check_radius(particle.radius)?;
        self.particles.push(particle);
        Ok(())
    }

    /// Append several particles; stops at the first invalid one
    pub fn extend<I>(&mut self, particles: I) -> Result<()>
    where
        I: IntoIterator<Item = Particle>,
    {
        for particle in particles {
            self.spawn(particle)?;
        }
        Ok(())
    }

    /// Advance by one step of `dt`
    pub fn step(&mut self, dt: f32) -> Result<()> {
        let constants = StepConstants::derive(&self.config, self.particles.len(), dt);

        if self.backend.uses_host_grid() {
            self.grid.rebuild(&self.particles, &self.config.domain);
        }

        self.backend
            .upload_state(&self.particles, &self.grid, &constants)?;
        self.backend.integrate(&mut self.particles);
        self.backend
            .resolve_collisions(&mut self.particles, &mut self.grid);
        self.backend.apply_boundary(&mut self.particles);
        self.backend.download_state(&mut self.particles)?;

        self.steps += 1;
        Ok(())
    }

    /// Run `iterations` full steps; `frame` only tags the log output
    pub fn run(&mut self, iterations: usize, dt: f32, frame: u64) -> Result<()> {
        for _ in 0..iterations {
            self.step(dt)?;
        }
        log::trace!(
            "frame {}: {} steps of dt={} over {} particles",
            frame,
            iterations,
            dt,
            self.particles.len()
        );
        Ok(())
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Grid used by the most recent collision phase
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn backend_label(&self) -> &'static str {
        self.backend.label()
    }

    /// Completed steps since construction
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use particle_physics::ThreadPool;
    use std::sync::{Arc, Mutex};

    /// Records the phase order and forwards to the CPU backend
    struct Recording {
        inner: CpuBackend,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ComputeBackend for Recording {
        fn label(&self) -> &'static str {
            "recording"
        }

        fn uses_host_grid(&self) -> bool {
            self.inner.uses_host_grid()
        }

        fn upload_state(
            &mut self,
            particles: &[Particle],
            grid: &SpatialGrid,
            constants: &StepConstants,
        ) -> Result<()> {
            self.log.lock().unwrap().push("upload");
            self.inner.upload_state(particles, grid, constants)
        }

        fn integrate(&mut self, particles: &mut [Particle]) {
            self.log.lock().unwrap().push("integrate");
            self.inner.integrate(particles)
        }

        fn resolve_collisions(&mut self, particles: &mut [Particle], grid: &mut SpatialGrid) {
            self.log.lock().unwrap().push("collide");
            self.inner.resolve_collisions(particles, grid)
        }

        fn apply_boundary(&mut self, particles: &mut [Particle]) {
            self.log.lock().unwrap().push("boundary");
            self.inner.apply_boundary(particles)
        }

        fn download_state(&mut self, particles: &mut [Particle]) -> Result<()> {
            self.log.lock().unwrap().push("download");
            self.inner.download_state(particles)
        }
    }

    #[test]
    fn phases_run_in_contract_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let backend = Recording {
            inner: CpuBackend::new(ThreadPool::new(2).unwrap()),
            log: log.clone(),
        };
        let mut sim = Simulation::new(SimulationConfig::default(), Box::new(backend)).unwrap();
        sim.spawn(Particle::new(Vec2::new(100.0, 100.0), 3.0)).unwrap();
        sim.run(2, 1.0, 0).unwrap();

        let expected = ["upload", "integrate", "collide", "boundary", "download"];
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 10);
        assert_eq!(&log[..5], &expected);
        assert_eq!(&log[5..], &expected);
        assert_eq!(sim.steps(), 2);
        assert_eq!(sim.backend_label(), "recording");
    }

    #[test]
    fn spawn_rejects_invalid_particles() {
        let mut sim = Simulation::cpu(SimulationConfig::default().with_worker_multiplier(1)).unwrap();
        assert!(sim.spawn(Particle::new(Vec2::new(10.0, 10.0), -1.0)).is_err());
        assert!(sim
            .extend([
                Particle::new(Vec2::new(10.0, 10.0), 1.0),
                Particle::new(Vec2::new(10.0, 10.0), 1.0).with_mass(0.0),
            ])
            .is_err());
        assert_eq!(sim.particles().len(), 1);
    }

    #[test]
    fn spawn_rejects_particles_wider_than_a_cell() {
        let mut sim = Simulation::cpu(SimulationConfig::default().with_worker_multiplier(1)).unwrap();
        let err = sim
            .spawn(Particle::new(Vec2::new(101.0, 100.0), 5.0))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::SimulationError::Physics(particle_physics::PhysicsError::InvalidParticle(_))
        ));
        assert!(sim.particles().is_empty());

        // a diameter equal to the cell size is still accepted
        sim.spawn(Particle::new(Vec2::new(101.0, 100.0), 3.0)).unwrap();
        assert_eq!(sim.particles().len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig::default().with_collision_response(f32::NAN);
        assert!(Simulation::cpu(config).is_err());
    }

    #[test]
    fn store_grows_between_steps() {
        let mut sim = Simulation::cpu(SimulationConfig::default().with_worker_multiplier(1)).unwrap();
        sim.spawn(Particle::new(Vec2::new(50.0, 50.0), 3.0)).unwrap();
        sim.step(1.0).unwrap();
        sim.spawn(Particle::new(Vec2::new(80.0, 50.0), 3.0)).unwrap();
        sim.step(1.0).unwrap();

        assert_eq!(sim.particles().len(), 2);
        assert_eq!(sim.grid().particle_count(), 2);
    }
}
