//! Health monitoring for resource pools

use crate::pool::PoolStatus;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{from_fn, PoolConfiguration, ResourcePool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ResourcePool::new(
///     from_fn(|| async { Ok::<_, String>(1u8) }),
///     PoolConfiguration::default(),
/// )
/// .unwrap();
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.busy_objects, 0);
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Busy resources relative to the maximum (0.0 to 1.0)
    pub utilization: f64,

    pub free_objects: usize,
    pub busy_objects: usize,
    pub waiting_requests: usize,
    pub max_size: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive health from a status snapshot
    pub fn new(status: &PoolStatus) -> Self {
        let utilization = status.utilization();
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if status.closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        if !status.closed && utilization > 0.9 {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
        }

        // Saturated: callers queue and no more resources may be created.
        if status.waiting > 0 && status.size + status.pending >= status.max {
            warnings.push(format!("{} requests waiting at maximum size", status.waiting));
            is_healthy = false;
        }

        if !status.closed && status.size + status.pending < status.min {
            warnings.push(format!(
                "Below minimum size: {} of {}",
                status.size + status.pending,
                status.min
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            free_objects: status.free,
            busy_objects: status.busy,
            waiting_requests: status.waiting,
            max_size: status.max,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
