//! Idle tracking and periodic eviction of free resources

use std::collections::VecDeque;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::pooled::ResourceId;

/// A free resource and the moment it becomes eligible for eviction
pub(crate) struct IdleEntry<R> {
    pub id: ResourceId,
    pub resource: R,
    pub expires_at: Instant,
}

/// Free resources, oldest first.
///
/// Entries are appended with `now + idle_timeout` and the timeout is fixed
/// for the pool's lifetime, so expiry never decreases from front to back.
pub(crate) struct IdleList<R> {
    entries: VecDeque<IdleEntry<R>>,
}

impl<R> IdleList<R> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, id: ResourceId, resource: R, expires_at: Instant) {
        debug_assert!(
            self.entries
                .back()
                .is_none_or(|last| last.expires_at <= expires_at),
            "idle expiry must not decrease"
        );
        self.entries.push_back(IdleEntry {
            id,
            resource,
            expires_at,
        });
    }

    /// Put back an entry that was just taken from the front
    pub fn restore(&mut self, entry: IdleEntry<R>) {
        self.entries.push_front(entry);
    }

    pub fn pop_oldest(&mut self) -> Option<IdleEntry<R>> {
        self.entries.pop_front()
    }

    /// Take the oldest entry if its expiry has passed
    pub fn pop_expired(&mut self, now: Instant) -> Option<IdleEntry<R>> {
        if self.entries.front()?.expires_at <= now {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = IdleEntry<R>> + '_ {
        self.entries.drain(..)
    }
}

/// Run `tick` every `period` until it returns `false`.
///
/// The first tick fires one full period after spawning.
pub(crate) fn spawn_periodic<T>(runtime: &Handle, period: Duration, mut tick: T) -> JoinHandle<()>
where
    T: FnMut() -> bool + Send + 'static,
{
    runtime.spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !tick() {
                break;
            }
        }
    })
}
