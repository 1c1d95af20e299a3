use particle_physics::PhysicsError;
use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, SimulationError>;

/// Errors surfaced by the simulation engine and its backends.
///
/// Resource acquisition failures are not recovered from; callers are
/// expected to abort startup.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid configuration or particle, or worker pool failure.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// No GPU adapter matched the request.
    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    /// The adapter refused to create a device.
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    /// Mapping a readback buffer failed.
    #[error("failed to map readback buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    /// Waiting on the device failed.
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    /// The readback callback never reported back.
    #[error("readback channel closed before the buffer was mapped")]
    ReadbackLost,

    /// Host and device disagree on the particle count.
    #[error("particle count mismatch: host has {host}, device has {device}")]
    CountMismatch { host: usize, device: usize },
}
