//! Error types for the resource pool

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool queue is full")]
    Overflow,

    #[error("Resource request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Pool is being closed now")]
    Closed,

    #[error("Error creating resource: {0}")]
    CreateFailed(String),

    #[error("Invalid pool limits: min {min}, max {max}")]
    InvalidLimits { min: usize, max: usize },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No tokio runtime available to drive the pool")]
    NoRuntime,

    #[error("Failed to export metrics: {0}")]
    MetricsExport(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(PoolError::Overflow.to_string(), "Pool queue is full");
        assert_eq!(PoolError::Closed.to_string(), "Pool is being closed now");
        assert_eq!(
            PoolError::InvalidLimits { min: 5, max: 2 }.to_string(),
            "Invalid pool limits: min 5, max 2"
        );
    }
}
