use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use esox_resourcepool::Factory;

/// Counts factory and destructor calls
#[derive(Clone, Default)]
pub struct Tracker {
    created: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
}

impl Tracker {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn factory(&self) -> TrackingFactory {
        TrackingFactory {
            tracker: self.clone(),
            delay: Duration::ZERO,
        }
    }

    /// Factory whose creations take `delay`
    pub fn slow_factory(&self, delay: Duration) -> TrackingFactory {
        TrackingFactory {
            tracker: self.clone(),
            delay,
        }
    }
}

pub struct TrackingFactory {
    tracker: Tracker,
    delay: Duration,
}

#[async_trait]
impl Factory for TrackingFactory {
    type Resource = usize;
    type Error = String;

    async fn create(&self) -> Result<usize, String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.tracker.created.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn destroy(&self, _resource: usize) {
        self.tracker.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Let spawned pool tasks run to completion under paused time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
