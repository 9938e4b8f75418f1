//! Basic usage examples

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use esox_resourcepool::{
    Factory, PoolConfiguration, PoolEvent, ResourcePool, TimedQueue, TimedQueueConfig, from_fn,
};
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Esox ResourcePool - Basic Examples ===\n");

    // Example 1: Closure factory
    closure_factory().await;

    // Example 2: Custom factory with destructor
    custom_factory().await;

    // Example 3: Timed queue
    timed_queue().await;

    // Example 4: Lifecycle events
    lifecycle_events().await;

    // Example 5: Health and metrics
    health_and_metrics().await;
}

async fn closure_factory() {
    println!("1. Closure Factory:");
    let pool = ResourcePool::new(
        from_fn(|| async { Ok::<_, String>(vec![0u8; 4096]) }),
        PoolConfiguration::new().with_name("buffers").with_limits(1, 4),
    )
    .unwrap();

    {
        let buffer = pool.acquire().await.unwrap();
        println!("   Got buffer {} of {} bytes", buffer.id(), buffer.len());
        // Buffer returns to the pool when it goes out of scope
    }

    println!("   Free after drop: {}", pool.status().free);
    println!();
}

struct Connection {
    number: usize,
}

struct Connector {
    opened: AtomicUsize,
}

#[async_trait]
impl Factory for Connector {
    type Resource = Connection;
    type Error = std::io::Error;

    async fn create(&self) -> Result<Connection, std::io::Error> {
        sleep(Duration::from_millis(20)).await;
        let number = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        println!("   Opened connection {number}");
        Ok(Connection { number })
    }

    fn destroy(&self, connection: Connection) {
        println!("   Closed connection {}", connection.number);
    }
}

async fn custom_factory() {
    println!("2. Custom Factory:");
    let pool = ResourcePool::new(
        Connector {
            opened: AtomicUsize::new(0),
        },
        PoolConfiguration::new().with_name("db").with_limits(0, 2),
    )
    .unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    println!("   Using connections {} and {}", first.number, second.number);

    // A broken connection is destroyed instead of returned
    pool.remove_bad_object(first);
    pool.release(second);

    pool.close();
    println!();
}

async fn timed_queue() {
    println!("3. Timed Queue:");
    let queue = TimedQueue::new(
        TimedQueueConfig::new().with_default_timeout(Duration::from_millis(100)),
    );
    let pool = ResourcePool::with_queue(
        from_fn(|| async { Ok::<_, String>(42) }),
        PoolConfiguration::new().with_limits(1, 1),
        queue,
    )
    .unwrap();

    // Hold the only resource
    let _held = pool.acquire().await.unwrap();

    // Try to get another (should time out)
    match pool.acquire_with_param(Duration::from_millis(50)).await {
        Ok(value) => println!("   Got {}", *value),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn lifecycle_events() {
    println!("4. Lifecycle Events:");
    let pool = ResourcePool::new(
        from_fn(|| async { Ok::<_, String>("session") }),
        PoolConfiguration::new()
            .with_limits(0, 2)
            .with_idle_timeout(Duration::from_millis(100))
            .with_idle_check_interval(Duration::from_millis(50)),
    )
    .unwrap();

    let mut events = pool.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("   Event: {:?}", event);
            if event == PoolEvent::PoolClosed {
                break;
            }
        }
    });

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    drop(first);
    drop(second);

    // Let the idle sweep evict both sessions
    sleep(Duration::from_millis(300)).await;
    pool.close();
    let _ = printer.await;

    println!();
}

async fn health_and_metrics() {
    println!("5. Health and Metrics:");
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);
    let pool = ResourcePool::new(
        from_fn(move || {
            let counter = Arc::clone(&counter);
            async move { Ok::<_, String>(counter.fetch_add(1, Ordering::Relaxed)) }
        }),
        PoolConfiguration::new().with_name("workers").with_limits(2, 4),
    )
    .unwrap();

    let held: Vec<_> = {
        let mut held = Vec::new();
        for _ in 0..3 {
            held.push(pool.acquire().await.unwrap());
        }
        held
    };

    let health = pool.get_health_status();
    println!("   Healthy: {}", health.is_healthy());
    println!("   Utilization: {:.1}%", health.utilization * 100.0);
    for warning in &health.warnings {
        println!("   Warning: {}", warning);
    }
    drop(held);

    let metrics = pool.get_metrics();
    println!("   Created: {}", created.load(Ordering::Relaxed));
    println!("   Acquired: {}", metrics.total_acquired);
    println!("   Released: {}", metrics.total_released);

    #[cfg(feature = "prometheus")]
    {
        let output = pool.export_metrics_prometheus("workers", None).unwrap();
        println!("\n{}", output);
    }

    println!();
}
