//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pool::PoolStatus;

/// Metrics snapshot for a pool
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
///     PoolConfiguration::new().with_limits(1, 2),
/// )
/// .unwrap();
///
/// let resource = pool.acquire().await.unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_acquired, 1);
/// assert_eq!(metrics.busy_objects, 1);
/// # drop(resource);
/// # }
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources produced by the factory
    pub total_created: usize,

    /// Failed factory calls
    pub create_failures: usize,

    /// Resources handed to the destructor
    pub total_destroyed: usize,

    /// Resources handed to requesters
    pub total_acquired: usize,

    /// Resources returned by requesters
    pub total_released: usize,

    /// Resources reported bad
    pub bad_objects: usize,

    /// Free resources evicted by the idle sweep
    pub expired_objects: usize,

    /// Requests rejected because the pool was closed
    pub closed_rejections: usize,

    pub busy_objects: usize,
    pub free_objects: usize,
    pub pending_creates: usize,
    pub waiting_requests: usize,
    pub min_size: usize,
    pub max_size: usize,

    /// Busy resources relative to the maximum (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        for (name, value) in self.counters().into_iter().chain(self.gauges()) {
            metrics.insert(name.to_string(), value.to_string());
        }
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }

    fn counters(&self) -> [(&'static str, usize); 8] {
        [
            ("total_created", self.total_created),
            ("create_failures", self.create_failures),
            ("total_destroyed", self.total_destroyed),
            ("total_acquired", self.total_acquired),
            ("total_released", self.total_released),
            ("bad_objects", self.bad_objects),
            ("expired_objects", self.expired_objects),
            ("closed_rejections", self.closed_rejections),
        ]
    }

    fn gauges(&self) -> [(&'static str, usize); 6] {
        [
            ("busy_objects", self.busy_objects),
            ("free_objects", self.free_objects),
            ("pending_creates", self.pending_creates),
            ("waiting_requests", self.waiting_requests),
            ("min_size", self.min_size),
            ("max_size", self.max_size),
        ]
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "prometheus")]
pub struct MetricsExporter;

#[cfg(feature = "prometheus")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{from_fn, PoolConfiguration, ResourcePool};
    /// use std::collections::HashMap;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let pool = ResourcePool::new(
    ///     from_fn(|| async { Ok::<_, String>(1u8) }),
    ///     PoolConfiguration::default(),
    /// )
    /// .unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("resourcepool_objects_busy"));
    /// assert!(output.contains("service=\"api\""));
    /// # }
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            labels.extend(tags.iter().map(|(key, value)| (key.clone(), value.clone())));
        }
        let registry = Registry::new_custom(None, Some(labels)).map_err(export_error)?;

        for (name, value) in metrics.counters() {
            let base = name.strip_prefix("total_").unwrap_or(name);
            let counter = IntCounter::with_opts(Opts::new(
                format!("resourcepool_{base}_total"),
                name.replace('_', " "),
            ))
            .map_err(export_error)?;
            counter.inc_by(value as u64);
            registry.register(Box::new(counter)).map_err(export_error)?;
        }

        for (name, value) in metrics.gauges() {
            let metric_name = match name.strip_suffix("_objects") {
                Some(state) => format!("resourcepool_objects_{state}"),
                None => format!("resourcepool_{name}"),
            };
            let gauge = IntGauge::with_opts(Opts::new(metric_name, name.replace('_', " ")))
                .map_err(export_error)?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge)).map_err(export_error)?;
        }

        let utilization = Gauge::with_opts(Opts::new(
            "resourcepool_utilization",
            "Busy resources relative to the maximum",
        ))
        .map_err(export_error)?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization)).map_err(export_error)?;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(|error| crate::PoolError::MetricsExport(error.to_string()))
    }
}

#[cfg(feature = "prometheus")]
fn export_error(error: prometheus::Error) -> crate::PoolError {
    crate::PoolError::MetricsExport(error.to_string())
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub create_failures: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub total_acquired: AtomicUsize,
    pub total_released: AtomicUsize,
    pub bad_objects: AtomicUsize,
    pub expired_objects: AtomicUsize,
    pub closed_rejections: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, status: &PoolStatus) -> PoolMetrics {
        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            bad_objects: self.bad_objects.load(Ordering::Relaxed),
            expired_objects: self.expired_objects.load(Ordering::Relaxed),
            closed_rejections: self.closed_rejections.load(Ordering::Relaxed),
            busy_objects: status.busy,
            free_objects: status.free,
            pending_creates: status.pending,
            waiting_requests: status.waiting,
            min_size: status.min,
            max_size: status.max,
            utilization: status.utilization(),
        }
    }
}
