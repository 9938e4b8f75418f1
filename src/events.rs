//! Lifecycle notifications emitted by a pool

use tokio::sync::broadcast;

use crate::errors::PoolError;
use crate::pooled::ResourceId;

/// Why a resource left the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RemovalReason {
    /// Reported bad through `remove_bad_object`
    Error,
    /// Idle longer than the idle timeout while above the minimum
    Expired,
    /// Destroyed because the pool closed
    Closed,
}

/// Events emitted during resource lifecycle operations
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    /// The factory produced a resource
    CreateSuccess { id: ResourceId },
    /// The factory failed; the pool will retry through its growth pass
    CreateError { error: PoolError },
    /// A new resource joined the free list
    ObjectAdded { id: ResourceId },
    /// A busy resource was reported bad
    ObjectError { id: ResourceId },
    /// A free resource idled past its expiry
    ObjectExpired { id: ResourceId },
    /// A resource was destroyed
    ObjectRemoved { id: ResourceId, reason: RemovalReason },
    /// A caller handed back a resource that is not busy in this pool
    UnknownResource { id: ResourceId },
    /// `close` was called
    PoolClosed,
}

/// Broadcast channel for [`PoolEvent`]s.
///
/// Emission never blocks: without subscribers, or with lagging ones, events
/// are dropped.
pub(crate) struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn emit(&self, event: PoolEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}
