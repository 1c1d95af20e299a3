//! Headless Verlet particle driver
//!
//! Feeds particles in from a row of spawners and steps the simulation frame
//! by frame, logging a rolling FPS average and the particle count.
//!
//! ```text
//! verlet-particles [cpu|gpu] [frames] [box|circle]
//! ```
//!
//! `VERLET_BACKEND` selects the backend when no argument is given.

use glam::Vec2;
use particle_physics::{BoundaryShape, Particle, SimulationConfig, CIRCLE_RADIUS};
use particle_simulation::{ComputeBackend, CpuBackend, GpuBackend, Simulation};
use std::collections::VecDeque;
use std::time::Instant;

const FPS: u64 = 60;
const SUBSTEPS: usize = 10;
const DEFAULT_FRAMES: u64 = 1200;
const FPS_HISTORY: usize = 30;

const SPAWN_ORIGIN: Vec2 = Vec2::new(100.0, 10.0);
const SPAWN_VELOCITY: Vec2 = Vec2::new(0.1, 0.1);
const SPAWN_RADIUS: f32 = 2.0;
const MAX_SPAWNERS: u64 = 100;
const SPAWN_UNTIL_FRAME: u64 = 1000;

struct Options {
    backend: String,
    frames: u64,
    circle: bool,
}

impl Options {
    fn from_env() -> Self {
        let mut args = std::env::args().skip(1);
        let backend = args
            .next()
            .or_else(|| std::env::var("VERLET_BACKEND").ok())
            .unwrap_or_else(|| "cpu".to_string());
        let frames = args
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FRAMES);
        let circle = args.next().is_some_and(|s| s == "circle");
        Self {
            backend,
            frames,
            circle,
        }
    }
}

fn create_backend(
    name: &str,
    config: &SimulationConfig,
) -> particle_simulation::Result<Box<dyn ComputeBackend>> {
    match name {
        "gpu" => Ok(Box::new(pollster::block_on(GpuBackend::request())?)),
        "cpu" => Ok(Box::new(CpuBackend::with_multiplier(config.worker_multiplier)?)),
        other => {
            log::warn!("Unknown backend '{}', using cpu", other);
            Ok(Box::new(CpuBackend::with_multiplier(config.worker_multiplier)?))
        }
    }
}

/// Spawners widen over time; every other frame each one drops a particle
fn spawn_wave(sim: &mut Simulation, frame: u64) -> particle_simulation::Result<()> {
    if frame >= SPAWN_UNTIL_FRAME || frame % 2 != 0 {
        return Ok(());
    }

    let spawners = (frame / FPS * 10 + 1).min(MAX_SPAWNERS);
    let spacing = 2.0 * (SPAWN_RADIUS + 1.0);
    sim.extend((0..spawners).map(|i| {
        let position = SPAWN_ORIGIN + Vec2::new(spacing * i as f32, 0.0);
        Particle::with_velocity(position, SPAWN_VELOCITY, SPAWN_RADIUS)
    }))
}

fn main() {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = Options::from_env();
    let mut config = SimulationConfig::default();
    if options.circle {
        let circle = BoundaryShape::circle_in(&config.domain, CIRCLE_RADIUS);
        config = config.with_boundary(circle);
    }

    log::info!(
        "Starting Verlet particle simulation ({} backend, {} frames)",
        options.backend,
        options.frames
    );

    let backend = match create_backend(&options.backend, &config) {
        Ok(backend) => backend,
        Err(e) => {
            log::error!("Failed to create {} backend: {}", options.backend, e);
            std::process::exit(1);
        }
    };

    let mut sim = match Simulation::new(config, backend) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("Invalid simulation setup: {}", e);
            std::process::exit(1);
        }
    };

    log::info!("Simulation ready on the {} backend", sim.backend_label());

    let dt = FPS as f32 / SUBSTEPS as f32;
    let mut fps_history: VecDeque<f32> = VecDeque::with_capacity(FPS_HISTORY);
    let started = Instant::now();

    for frame in 1..=options.frames {
        let frame_start = Instant::now();

        if let Err(e) = sim.run(SUBSTEPS, dt, frame) {
            log::error!("Frame {} failed: {}", frame, e);
            std::process::exit(1);
        }
        if let Err(e) = spawn_wave(&mut sim, frame) {
            log::error!("Spawning failed on frame {}: {}", frame, e);
            std::process::exit(1);
        }

        let frame_time = frame_start.elapsed().as_secs_f32().max(f32::EPSILON);
        fps_history.push_back(1.0 / frame_time);
        if fps_history.len() > FPS_HISTORY {
            fps_history.pop_front();
        }

        if frame % FPS == 0 {
            let fps = fps_history.iter().sum::<f32>() / fps_history.len() as f32;
            log::info!(
                "Frame {}: {:.2} FPS, {} particles",
                frame,
                fps,
                sim.particles().len()
            );
        }
    }

    log::info!(
        "Finished {} steps over {} particles in {:.2?}",
        sim.steps(),
        sim.particles().len(),
        started.elapsed()
    );
}
