//! Holding areas for requests that could not be served immediately
//!
//! The pool only talks to the [`WaiterQueue`] trait. Two implementations ship
//! with the crate: [`SimpleQueue`] (plain FIFO) and [`TimedQueue`] (FIFO where
//! every waiter carries a deadline).

mod simple;
mod timed;

pub use simple::SimpleQueue;
pub use timed::{TimedQueue, TimedQueueConfig};

use crate::waiter::Waiter;

/// Ordered storage for pending requests.
///
/// `push` may refuse a waiter (for example when a capacity is reached); it
/// must then complete it through [`Waiter::reject`] instead of dropping it.
pub trait WaiterQueue<R>: Send {
    /// Queue-specific parameter passed through from `acquire`
    type Param: Send;

    /// Add a waiter at the back
    fn push(&mut self, waiter: Waiter<R>, param: Option<Self::Param>);

    /// Remove the next waiter to serve
    fn pop(&mut self) -> Option<Waiter<R>>;

    /// Number of waiters held
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop any background activity; called once when the pool closes
    fn close(&mut self);
}
