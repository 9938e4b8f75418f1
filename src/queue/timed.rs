//! FIFO waiter queue with per-request deadlines

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::errors::PoolError;
use crate::queue::WaiterQueue;
use crate::waiter::Waiter;

const FALLBACK_CHECK_INTERVAL: Duration = Duration::from_secs(1);
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Options for [`TimedQueue`]
///
/// # Examples
///
/// ```
/// use esox_resourcepool::TimedQueueConfig;
/// use std::time::Duration;
///
/// let config = TimedQueueConfig::new()
///     .with_default_timeout(Duration::from_secs(5))
///     .with_queue_size(100);
///
/// assert_eq!(config.effective_check_interval(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TimedQueueConfig {
    /// Timeout applied when `acquire` passes no parameter; `None` never times out
    pub default_timeout: Option<Duration>,

    /// Maximum number of waiters; 0 means unbounded
    pub queue_size: usize,

    /// How often deadlines are checked
    pub check_interval: Option<Duration>,
}

impl TimedQueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Explicit interval, else a tenth of the default timeout, else one second
    pub fn effective_check_interval(&self) -> Duration {
        if let Some(interval) = self.check_interval.filter(|interval| !interval.is_zero()) {
            return interval;
        }
        match self.default_timeout.filter(|timeout| !timeout.is_zero()) {
            Some(timeout) => (timeout / 10).max(MIN_CHECK_INTERVAL),
            None => FALLBACK_CHECK_INTERVAL,
        }
    }
}

struct TimedEntry<R> {
    waiter: Waiter<R>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl<R> TimedEntry<R> {
    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

struct TimedState<R> {
    entries: VecDeque<TimedEntry<R>>,
    sweep: Option<JoinHandle<()>>,
    closed: bool,
}

impl<R> TimedState<R> {
    fn stop_sweep(&mut self) {
        if let Some(handle) = self.sweep.take() {
            handle.abort();
        }
    }

    /// Reject every waiter whose deadline passed, scanning front to back
    fn reject_expired(&mut self, now: Instant) {
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.waiter.is_cancelled() {
                continue;
            }
            if entry.is_expired(now) {
                tracing::trace!(ticket = entry.waiter.ticket(), "queued request timed out");
                entry.waiter.reject(PoolError::Timeout(entry.timeout));
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
    }
}

/// FIFO queue whose waiters give up after a deadline
///
/// The `acquire` parameter is the timeout for that request. A zero timeout
/// never expires; no parameter falls back to the configured default.
/// Expired waiters receive [`PoolError::Timeout`]. The deadline sweep runs
/// only while waiters are queued.
pub struct TimedQueue<R> {
    state: Arc<Mutex<TimedState<R>>>,
    default_timeout: Option<Duration>,
    queue_size: usize,
    check_interval: Duration,
    runtime: Option<Handle>,
}

impl<R: Send + 'static> TimedQueue<R> {
    /// Create a queue. Deadline sweeps need a tokio runtime; without one,
    /// waiters are never timed out.
    pub fn new(config: TimedQueueConfig) -> Self {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            tracing::warn!("timed queue created outside a tokio runtime, timeouts disabled");
        }
        Self {
            state: Arc::new(Mutex::new(TimedState {
                entries: VecDeque::new(),
                sweep: None,
                closed: false,
            })),
            default_timeout: config.default_timeout,
            queue_size: config.queue_size,
            check_interval: config.effective_check_interval(),
            runtime,
        }
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    fn timeout_for(&self, param: Option<Duration>) -> Option<Duration> {
        match param {
            Some(timeout) if timeout.is_zero() => None,
            Some(timeout) => Some(timeout),
            None => self.default_timeout.filter(|timeout| !timeout.is_zero()),
        }
    }
}

fn arm_sweep<R: Send + 'static>(
    shared: &Arc<Mutex<TimedState<R>>>,
    state: &mut TimedState<R>,
    runtime: &Handle,
    interval: Duration,
) {
    if state.sweep.is_some() || state.closed {
        return;
    }
    let weak = Arc::downgrade(shared);
    let next_runtime = runtime.clone();
    state.sweep = Some(runtime.spawn(async move {
        tokio::time::sleep(interval).await;
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        state.sweep = None;
        state.reject_expired(Instant::now());
        if !state.entries.is_empty() {
            arm_sweep(&shared, &mut state, &next_runtime, interval);
        }
    }));
}

impl<R: Send + 'static> WaiterQueue<R> for TimedQueue<R> {
    type Param = Duration;

    fn push(&mut self, waiter: Waiter<R>, param: Option<Duration>) {
        let mut state = self.state.lock();
        state.entries.retain(|entry| !entry.waiter.is_cancelled());
        if self.queue_size > 0 && state.entries.len() >= self.queue_size {
            waiter.reject(PoolError::Overflow);
            return;
        }

        let timeout = self.timeout_for(param);
        state.entries.push_back(TimedEntry {
            waiter,
            timeout: timeout.unwrap_or_default(),
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        });

        if let Some(runtime) = &self.runtime {
            arm_sweep(&self.state, &mut state, runtime, self.check_interval);
        }
    }

    fn pop(&mut self) -> Option<Waiter<R>> {
        let mut state = self.state.lock();
        let entry = state.entries.pop_front()?;
        if state.entries.is_empty() {
            state.stop_sweep();
        }
        Some(entry.waiter)
    }

    fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|entry| !entry.waiter.is_cancelled())
            .count()
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.stop_sweep();
        state.closed = true;
    }
}

impl<R> Drop for TimedQueue<R> {
    fn drop(&mut self) {
        self.state.lock().stop_sweep();
    }
}
