//! Plain FIFO waiter queue

use std::collections::VecDeque;

use crate::errors::PoolError;
use crate::queue::WaiterQueue;
use crate::waiter::Waiter;

/// Strict FIFO queue with an optional capacity
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{SimpleQueue, WaiterQueue};
///
/// let queue = SimpleQueue::<String>::bounded(16);
/// assert_eq!(queue.capacity(), Some(16));
/// assert!(queue.is_empty());
/// ```
pub struct SimpleQueue<R> {
    waiters: VecDeque<Waiter<R>>,
    queue_size: usize,
}

impl<R> SimpleQueue<R> {
    /// Unbounded queue
    pub fn new() -> Self {
        Self::bounded(0)
    }

    /// Queue holding at most `queue_size` waiters; 0 means unbounded
    pub fn bounded(queue_size: usize) -> Self {
        Self {
            waiters: VecDeque::new(),
            queue_size,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        (self.queue_size > 0).then_some(self.queue_size)
    }
}

impl<R> Default for SimpleQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Send> WaiterQueue<R> for SimpleQueue<R> {
    type Param = ();

    fn push(&mut self, waiter: Waiter<R>, _param: Option<()>) {
        // Requesters that gave up must not hold capacity.
        self.waiters.retain(|queued| !queued.is_cancelled());
        if self.queue_size > 0 && self.waiters.len() >= self.queue_size {
            waiter.reject(PoolError::Overflow);
            return;
        }
        self.waiters.push_back(waiter);
    }

    fn pop(&mut self) -> Option<Waiter<R>> {
        self.waiters.pop_front()
    }

    /// Waiters whose requester is still waiting
    fn len(&self) -> usize {
        self.waiters
            .iter()
            .filter(|waiter| !waiter.is_cancelled())
            .count()
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waiter::channel;

    #[test]
    fn test_fifo_order() {
        let mut queue = SimpleQueue::<u32>::new();
        let mut tickets = Vec::new();
        let mut pending = Vec::new();

        for _ in 0..10 {
            let (waiter, acquire) = channel();
            tickets.push(waiter.ticket());
            pending.push(acquire);
            queue.push(waiter, None);
            assert_eq!(queue.len(), tickets.len());
        }

        for (popped, ticket) in tickets.iter().enumerate() {
            let waiter = queue.pop().unwrap();
            assert_eq!(waiter.ticket(), *ticket);
            assert_eq!(queue.len(), tickets.len() - popped - 1);
        }
        assert!(queue.pop().is_none());
        queue.close();
    }

    #[tokio::test]
    async fn test_overflow_rejects_extra_waiters() {
        let mut queue = SimpleQueue::<u32>::bounded(10);
        let mut accepted = Vec::new();
        let mut overflowed = Vec::new();

        for _ in 0..10 {
            let (waiter, acquire) = channel();
            queue.push(waiter, None);
            accepted.push(acquire);
        }
        for _ in 0..10 {
            let (waiter, acquire) = channel();
            queue.push(waiter, None);
            overflowed.push(acquire);
            assert_eq!(queue.len(), 10);
        }

        for acquire in overflowed {
            assert_eq!(acquire.await.err(), Some(PoolError::Overflow));
        }
        while queue.pop().is_some() {}
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_abandoned_waiters_free_capacity() {
        let mut queue = SimpleQueue::<u32>::bounded(2);
        for _ in 0..2 {
            let (waiter, acquire) = channel();
            queue.push(waiter, None);
            drop(acquire);
        }
        assert_eq!(queue.len(), 0);

        let (waiter, acquire) = channel();
        let ticket = waiter.ticket();
        queue.push(waiter, None);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.waiters.len(), 1);
        assert_eq!(queue.pop().map(|waiter| waiter.ticket()), Some(ticket));
        drop(acquire);
    }
}
