use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, PhysicsError>;

/// Errors raised while configuring the CPU physics core.
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A particle that cannot be simulated (non-positive mass or radius, non-finite position).
    #[error("invalid particle: {0}")]
    InvalidParticle(String),

    /// The worker pool could not be started.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = PhysicsError::InvalidConfig("cell_size must be > 0".to_string());
        let msg = e.to_string();
        assert!(msg.contains("invalid configuration"));
        assert!(msg.contains("cell_size"));
    }
}
