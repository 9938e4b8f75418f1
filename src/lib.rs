//! # Esox ResourcePool
//!
//! Asynchronous pool of expensive resources (connections, sessions, handles)
//! for tokio applications.
//!
//! ## Features
//!
//! - Pluggable resource creation through the [`Factory`] trait
//! - Minimum and maximum size, adjustable at runtime
//! - Requests that find no free resource wait in a [`WaiterQueue`]:
//!   [`SimpleQueue`] for plain FIFO, [`TimedQueue`] for per-request deadlines
//! - Automatic return of resources via RAII (Drop trait)
//! - Idle eviction down to the minimum size
//! - Lifecycle events, health monitoring and metrics
//! - Prometheus metrics export
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{from_fn, PoolConfiguration, ResourcePool};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let pool = ResourcePool::new(
//!     from_fn(|| async { Ok::<_, std::io::Error>(vec![0u8; 1024]) }),
//!     PoolConfiguration::new().with_name("buffers").with_limits(1, 8),
//! )
//! .unwrap();
//!
//! {
//!     let buffer = pool.acquire().await.unwrap();
//!     println!("Got {} bytes", buffer.len());
//!     // Resource automatically returned when `buffer` goes out of scope
//! }
//! # }
//! ```

mod config;
mod errors;
mod events;
mod eviction;
mod factory;
mod health;
mod metrics;
mod pool;
mod pooled;
mod queue;
mod waiter;

pub use config::PoolConfiguration;
pub use errors::{PoolError, PoolResult};
pub use events::{PoolEvent, RemovalReason};
pub use factory::{Factory, FnFactory, from_fn};
pub use health::HealthStatus;
pub use metrics::PoolMetrics;
#[cfg(feature = "prometheus")]
pub use metrics::MetricsExporter;
pub use pool::{PoolStatus, ResourcePool};
pub use pooled::{Pooled, ResourceId};
pub use queue::{SimpleQueue, TimedQueue, TimedQueueConfig, WaiterQueue};
pub use waiter::{Acquire, Waiter};
