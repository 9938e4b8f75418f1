//! Completion channel between a pending request and the pool

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::errors::{PoolError, PoolResult};
use crate::pooled::Pooled;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

type Completion<R> = PoolResult<Pooled<R>>;

/// Create a connected waiter / future pair
pub(crate) fn channel<R>() -> (Waiter<R>, Acquire<R>) {
    let (tx, rx) = oneshot::channel();
    let waiter = Waiter {
        tx,
        ticket: NEXT_TICKET.fetch_add(1, Ordering::Relaxed),
    };
    (waiter, Acquire::waiting(rx))
}

/// A queued request for a resource.
///
/// A waiter is completed exactly once, either by the pool handing it a
/// resource or by a queue rejecting it.
pub struct Waiter<R> {
    tx: oneshot::Sender<Completion<R>>,
    ticket: u64,
}

impl<R> Waiter<R> {
    /// Arrival order of this request, increasing across the process
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Whether the requester stopped waiting
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Complete the request with an error
    pub fn reject(self, error: PoolError) {
        // A cancelled requester has nobody left to tell.
        let _ = self.tx.send(Err(error));
    }

    /// Hand over a resource. Gives it back if the requester is gone.
    pub(crate) fn deliver(self, pooled: Pooled<R>) -> Option<Pooled<R>> {
        self.tx.send(Ok(pooled)).err().and_then(Result::ok)
    }
}

impl<R> std::fmt::Debug for Waiter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("ticket", &self.ticket)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

enum AcquireState<R> {
    Ready(Option<Completion<R>>),
    Waiting(oneshot::Receiver<Completion<R>>),
}

/// Future returned by [`ResourcePool::acquire`](crate::ResourcePool::acquire).
///
/// Dropping it before completion withdraws the request.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Acquire<R> {
    state: AcquireState<R>,
}

impl<R> Acquire<R> {
    pub(crate) fn ready(result: Completion<R>) -> Self {
        Self {
            state: AcquireState::Ready(Some(result)),
        }
    }

    fn waiting(rx: oneshot::Receiver<Completion<R>>) -> Self {
        Self {
            state: AcquireState::Waiting(rx),
        }
    }
}

// The resource is never pinned; only the receiver is polled.
impl<R> Unpin for Acquire<R> {}

impl<R> Future for Acquire<R> {
    type Output = Completion<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            AcquireState::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(PoolError::Closed)))
            }
            // A waiter dropped without completion means its queue went away
            // with the pool.
            AcquireState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(PoolError::Closed))),
        }
    }
}
