//! Pool configuration options

use std::time::Duration;

use crate::errors::{PoolError, PoolResult};

/// Configuration for resource pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_name("db")
///     .with_min_size(1)
///     .with_max_size(8)
///     .with_idle_timeout(Duration::from_secs(60));
///
/// assert_eq!(config.min_size, 1);
/// assert_eq!(config.max_size, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Pool name, used in log output
    pub name: String,

    /// Number of resources the pool keeps alive even when idle
    pub min_size: usize,

    /// Upper bound for resources created to serve waiting requests
    pub max_size: usize,

    /// How long a free resource may idle before it becomes eligible for eviction
    pub idle_timeout: Duration,

    /// Period of the idle sweep
    pub idle_check_interval: Duration,

    /// Delay before the growth pass is retried after a failed creation
    pub create_retry_delay: Duration,

    /// Buffer size of the lifecycle event channel
    pub event_capacity: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            min_size: 2,
            max_size: 4,
            idle_timeout: Duration::from_secs(30),
            idle_check_interval: Duration::from_secs(1),
            create_retry_delay: Duration::from_millis(100),
            event_capacity: 1024,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the minimum pool size
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new().with_min_size(0);
    /// assert_eq!(config.min_size, 0);
    /// ```
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Set the maximum pool size
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set both limits at once
    pub fn with_limits(self, min: usize, max: usize) -> Self {
        self.with_min_size(min).with_max_size(max)
    }

    /// Set idle timeout for free resources
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the idle sweep period
    pub fn with_idle_check_interval(mut self, interval: Duration) -> Self {
        self.idle_check_interval = interval;
        self
    }

    /// Set the delay before creation is retried
    pub fn with_create_retry_delay(mut self, delay: Duration) -> Self {
        self.create_retry_delay = delay;
        self
    }

    /// Set the event channel capacity
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the configuration for values the pool cannot run with
    pub fn validate(&self) -> PoolResult<()> {
        validate_limits(self.min_size, self.max_size)?;
        if self.idle_check_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "idle check interval must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(PoolError::InvalidConfiguration(
                "event capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_limits(min: usize, max: usize) -> PoolResult<()> {
    if max == 0 || min > max {
        return Err(PoolError::InvalidLimits { min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.min_size, 2);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.idle_check_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_limits() {
        let config = PoolConfiguration::new().with_limits(5, 2);
        assert_eq!(
            config.validate(),
            Err(PoolError::InvalidLimits { min: 5, max: 2 })
        );

        let config = PoolConfiguration::new().with_limits(0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_check_interval_rejected() {
        let config = PoolConfiguration::new().with_idle_check_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }
}
