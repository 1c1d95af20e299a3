//! Default tuning constants for the particle simulation
//!
//! Units are simulation units: pixels for distances and substeps for time.
//! Values are scaled for real-time visualization rather than physical accuracy.

/// Downward gravity applied to every particle each step
pub const GRAVITY: [f32; 2] = [0.0, 0.000098];

/// Fraction of velocity kept after bouncing off a boundary
pub const DAMPENING: f32 = 0.6;

/// Fraction of the pairwise overlap each particle is pushed out per contact.
///
/// Tunable rather than physical: a single relaxation pass with this factor
/// keeps stacks stable without iterating to convergence.
pub const COLLISION_RESPONSE: f32 = 0.25;

/// Floor for distances used as divisors
pub const DISTANCE_EPSILON: f32 = 1e-6;

/// Default particle radius
pub const PARTICLE_RADIUS: f32 = 3.0;

/// Default particle mass
pub const PARTICLE_MASS: f32 = 1.0;

/// Default domain width
pub const DOMAIN_WIDTH: f32 = 1280.0;

/// Default domain height
pub const DOMAIN_HEIGHT: f32 = 720.0;

/// Default grid cell edge (must be at least the largest particle diameter)
pub const CELL_SIZE: f32 = 2.0 * PARTICLE_RADIUS;

/// Radius of the circular container used by the demo
pub const CIRCLE_RADIUS: f32 = 350.0;

/// Worker threads per hardware thread
pub const WORKER_MULTIPLIER: usize = 4;
