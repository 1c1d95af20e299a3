//! # Particle Physics Engine
//!
//! CPU reference core for a Verlet particle simulation: particle state and
//! integration, a uniform-grid spatial index, circle-overlap collision
//! resolution, and box/circle containment.

pub mod boundary;
pub mod collision;
pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod particle;
pub mod pool;

pub use boundary::*;
pub use collision::*;
pub use config::*;
pub use constants::*;
pub use error::PhysicsError;
pub use grid::*;
pub use particle::*;
pub use pool::*;
