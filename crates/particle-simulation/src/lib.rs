//! # Particle Simulation Engine
//!
//! Steps a Verlet particle store through integrate, collide and contain
//! phases on either the CPU reference backend or a wgpu compute backend.

pub mod backend;
pub mod error;
pub mod gpu;
pub mod params;
pub mod simulation;

pub use backend::*;
pub use error::{Result, SimulationError};
pub use gpu::{GpuBackend, BASELINE_CAPACITY};
pub use params::*;
pub use simulation::*;
