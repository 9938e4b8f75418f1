//! Core resource pool implementation

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::{PoolConfiguration, validate_limits};
use crate::errors::{PoolError, PoolResult};
use crate::events::{EventBus, PoolEvent, RemovalReason};
use crate::eviction::{IdleEntry, IdleList, spawn_periodic};
use crate::factory::Factory;
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::pooled::{Checkin, Pooled, ResourceId, ReturnFn};
use crate::queue::{SimpleQueue, WaiterQueue};
use crate::waiter::{Acquire, Waiter, channel};

/// Point-in-time view of pool occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolStatus {
    pub min: usize,
    pub max: usize,
    /// Live resources, free plus busy
    pub size: usize,
    pub free: usize,
    pub busy: usize,
    /// Creations requested from the factory that have not resolved yet
    pub pending: usize,
    /// Requests queued for a resource
    pub waiting: usize,
    pub closed: bool,
}

impl PoolStatus {
    /// Busy resources relative to the maximum, capped at 1.0
    pub fn utilization(&self) -> f64 {
        if self.max > 0 {
            (self.busy as f64 / self.max as f64).min(1.0)
        } else {
            0.0
        }
    }
}

struct PoolState<R, Q> {
    min: usize,
    max: usize,
    closed: bool,
    all: HashSet<ResourceId>,
    busy: HashSet<ResourceId>,
    free: IdleList<R>,
    pending: usize,
    queue: Q,
    growth_scheduled: bool,
    idle_sweep: Option<JoinHandle<()>>,
}

impl<R, Q: WaiterQueue<R>> PoolState<R, Q> {
    /// Live resources plus those still being created
    fn live(&self) -> usize {
        self.all.len() + self.pending
    }

    fn status(&self) -> PoolStatus {
        PoolStatus {
            min: self.min,
            max: self.max,
            size: self.all.len(),
            free: self.free.len(),
            busy: self.busy.len(),
            pending: self.pending,
            waiting: self.queue.len(),
            closed: self.closed,
        }
    }
}

/// A resource on its way to the destructor
struct Doomed<R> {
    id: ResourceId,
    resource: R,
    reason: RemovalReason,
}

struct Shared<F: Factory, Q> {
    name: String,
    factory: F,
    state: Mutex<PoolState<F::Resource, Q>>,
    idle_timeout: Duration,
    create_retry_delay: Duration,
    events: EventBus,
    metrics: MetricsTracker,
    runtime: Handle,
    return_fn: ReturnFn<F::Resource>,
}

/// Asynchronous pool of factory-made resources
///
/// The pool keeps between `min_size` and `max_size` resources. Requests that
/// find no free resource wait in the pool's [`WaiterQueue`] and are served in
/// arrival order. Free resources idle past the idle timeout are destroyed
/// while the pool holds more than its minimum.
///
/// All state transitions happen under one lock. Factory and destructor calls
/// and request completions never run while it is held.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{from_fn, PoolConfiguration, ResourcePool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pool = ResourcePool::new(
///     from_fn(|| async { Ok::<_, String>(String::from("connection")) }),
///     PoolConfiguration::new().with_limits(1, 4),
/// )
/// .unwrap();
///
/// let conn = pool.acquire().await.unwrap();
/// assert_eq!(conn.as_str(), "connection");
/// pool.release(conn);
///
/// pool.close();
/// assert!(pool.acquire().await.is_err());
/// # }
/// ```
pub struct ResourcePool<F: Factory, Q = SimpleQueue<<F as Factory>::Resource>> {
    shared: Arc<Shared<F, Q>>,
}

impl<F: Factory, Q> Clone for ResourcePool<F, Q> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: Factory> ResourcePool<F> {
    /// Create a pool with an unbounded FIFO queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(factory: F, config: PoolConfiguration) -> PoolResult<Self> {
        Self::with_queue(factory, config, SimpleQueue::new())
    }
}

impl<F, Q> ResourcePool<F, Q>
where
    F: Factory,
    Q: WaiterQueue<F::Resource> + 'static,
{
    /// Create a pool that parks waiting requests in `queue`
    pub fn with_queue(factory: F, config: PoolConfiguration, queue: Q) -> PoolResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let shared = Arc::new_cyclic(|weak: &Weak<Shared<F, Q>>| {
            let home = weak.clone();
            let return_fn: ReturnFn<F::Resource> = Arc::new(move |id, resource, checkin| {
                if let Some(shared) = home.upgrade() {
                    match checkin {
                        Checkin::Release => shared.check_in(id, resource),
                        Checkin::Discard => shared.remove_bad(id, resource),
                    }
                }
            });

            Shared {
                name: config.name.clone(),
                factory,
                state: Mutex::new(PoolState {
                    min: config.min_size,
                    max: config.max_size,
                    closed: false,
                    all: HashSet::new(),
                    busy: HashSet::new(),
                    free: IdleList::new(),
                    pending: 0,
                    queue,
                    growth_scheduled: false,
                    idle_sweep: None,
                }),
                idle_timeout: config.idle_timeout,
                create_retry_delay: config.create_retry_delay,
                events: EventBus::new(config.event_capacity),
                metrics: MetricsTracker::new(),
                runtime,
                return_fn,
            }
        });

        {
            let mut state = shared.state.lock();
            let weak = Arc::downgrade(&shared);
            state.idle_sweep = Some(spawn_periodic(
                &shared.runtime,
                config.idle_check_interval,
                move || weak.upgrade().is_some_and(|shared| shared.sweep_idle()),
            ));
            shared.ensure_minimum(&mut state);
        }

        debug!(
            pool = %config.name,
            min = config.min_size,
            max = config.max_size,
            "pool created"
        );
        Ok(Self { shared })
    }

    /// Request a resource.
    ///
    /// The returned future resolves once a resource is assigned, or with an
    /// error if the pool is closed or the queue rejects the request.
    pub fn acquire(&self) -> Acquire<F::Resource> {
        self.shared.acquire(None)
    }

    /// Request a resource, passing `param` to the waiter queue (for
    /// [`TimedQueue`](crate::TimedQueue) this is the timeout)
    pub fn acquire_with_param(&self, param: Q::Param) -> Acquire<F::Resource> {
        self.shared.acquire(Some(param))
    }

    /// Request a resource and run `completion` with the outcome on a runtime task
    pub fn acquire_callback<C>(&self, param: Option<Q::Param>, completion: C)
    where
        C: FnOnce(PoolResult<Pooled<F::Resource>>) + Send + 'static,
    {
        let acquire = self.shared.acquire(param);
        self.shared.runtime.spawn(async move {
            completion(acquire.await);
        });
    }

    /// Return a resource obtained from [`acquire`](Self::acquire)
    pub fn release(&self, resource: Pooled<F::Resource>) {
        if !resource.returns_to(&self.shared.return_fn) {
            self.shared.report_unknown(resource.id());
            return;
        }
        let (id, resource) = resource.into_parts();
        self.shared.check_in(id, resource);
    }

    /// Destroy a resource that turned out to be broken instead of releasing it
    pub fn remove_bad_object(&self, resource: Pooled<F::Resource>) {
        if !resource.returns_to(&self.shared.return_fn) {
            self.shared.report_unknown(resource.id());
            resource.discard();
            return;
        }
        let (id, resource) = resource.into_parts();
        self.shared.remove_bad(id, resource);
    }

    /// Change the size limits.
    ///
    /// Raising them creates resources right away if the minimum or queued
    /// requests call for it. Lowering them destroys nothing; surplus drains
    /// through the idle sweep.
    pub fn adjust_limits(&self, min: usize, max: usize) -> PoolResult<()> {
        self.shared.adjust_limits(min, max)
    }

    /// Shut the pool down.
    ///
    /// Queued and future requests fail with [`PoolError::Closed`] and free
    /// resources are destroyed. Busy resources are destroyed as they come
    /// back. Calling it again does nothing.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn status(&self) -> PoolStatus {
        self.shared.state.lock().status()
    }

    /// Receive lifecycle events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.shared.events.subscribe()
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::new(&self.status())
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.shared.metrics.get_metrics(&self.status())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "prometheus")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<F, Q> fmt::Debug for ResourcePool<F, Q>
where
    F: Factory,
    Q: WaiterQueue<F::Resource> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.shared.name)
            .field("status", &self.status())
            .finish()
    }
}

impl<F, Q> Shared<F, Q>
where
    F: Factory,
    Q: WaiterQueue<F::Resource> + 'static,
{
    fn acquire(self: &Arc<Self>, param: Option<Q::Param>) -> Acquire<F::Resource> {
        let mut state = self.state.lock();
        if state.closed {
            MetricsTracker::record(&self.metrics.closed_rejections);
            return Acquire::ready(Err(PoolError::Closed));
        }

        if let Some(entry) = state.free.pop_oldest() {
            let pooled = self.check_out(&mut state, entry);
            MetricsTracker::record(&self.metrics.total_acquired);
            return Acquire::ready(Ok(pooled));
        }

        let (waiter, acquire) = channel();
        trace!(pool = %self.name, ticket = waiter.ticket(), "no free resource, queueing request");
        state.queue.push(waiter, param);
        self.schedule_growth(&mut state, Duration::ZERO);
        acquire
    }

    fn check_out(
        &self,
        state: &mut PoolState<F::Resource, Q>,
        entry: IdleEntry<F::Resource>,
    ) -> Pooled<F::Resource> {
        state.busy.insert(entry.id);
        Pooled::new(entry.resource, entry.id, Arc::clone(&self.return_fn))
    }

    /// Match free resources with queued requests, oldest with oldest
    fn feed_from_queue(&self, state: &mut PoolState<F::Resource, Q>) {
        while let Some(entry) = state.free.pop_oldest() {
            let Some(waiter) = next_live_waiter(&mut state.queue) else {
                state.free.restore(entry);
                break;
            };

            let ticket = waiter.ticket();
            let expires_at = entry.expires_at;
            let pooled = self.check_out(state, entry);
            match waiter.deliver(pooled) {
                None => {
                    MetricsTracker::record(&self.metrics.total_acquired);
                    trace!(pool = %self.name, ticket, "queued request served");
                }
                // The requester left between the liveness check and delivery.
                Some(returned) => {
                    let (id, resource) = returned.into_parts();
                    state.busy.remove(&id);
                    state.free.restore(IdleEntry {
                        id,
                        resource,
                        expires_at,
                    });
                }
            }
        }
    }

    fn check_in(&self, id: ResourceId, resource: F::Resource) {
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            if !state.busy.remove(&id) {
                drop(state);
                self.report_unknown(id);
                return;
            }
            MetricsTracker::record(&self.metrics.total_released);

            if state.closed {
                state.all.remove(&id);
                doomed.push(Doomed {
                    id,
                    resource,
                    reason: RemovalReason::Closed,
                });
            } else {
                let expires_at = Instant::now() + self.idle_timeout;
                state.free.push(id, resource, expires_at);
                self.feed_from_queue(&mut state);
            }
        }
        self.destroy_all(doomed);
    }

    fn remove_bad(self: &Arc<Self>, id: ResourceId, resource: F::Resource) {
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            if state.all.contains(&id) && state.busy.contains(&id) {
                state.all.remove(&id);
                state.busy.remove(&id);
                MetricsTracker::record(&self.metrics.bad_objects);
                warn!(pool = %self.name, %id, "resource reported bad, removing it");
                self.events.emit(PoolEvent::ObjectError { id });
                doomed.push(Doomed {
                    id,
                    resource,
                    reason: RemovalReason::Error,
                });
            } else {
                self.report_unknown(id);
            }
            self.grow(&mut state);
        }
        self.destroy_all(doomed);
    }

    fn report_unknown(&self, id: ResourceId) {
        warn!(pool = %self.name, %id, "returned resource not found in busy list");
        self.events.emit(PoolEvent::UnknownResource { id });
    }

    fn create_resource(self: &Arc<Self>, state: &mut PoolState<F::Resource, Q>) {
        state.pending += 1;
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let result = shared.factory.create().await;
            shared.finish_create(result);
        });
    }

    fn finish_create(self: &Arc<Self>, result: Result<F::Resource, F::Error>) {
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            state.pending = state.pending.saturating_sub(1);

            match result {
                Ok(resource) => {
                    let id = ResourceId::next();
                    MetricsTracker::record(&self.metrics.total_created);
                    self.events.emit(PoolEvent::CreateSuccess { id });

                    if state.closed {
                        doomed.push(Doomed {
                            id,
                            resource,
                            reason: RemovalReason::Closed,
                        });
                    } else {
                        debug!(pool = %self.name, %id, "resource created");
                        state.all.insert(id);
                        let expires_at = Instant::now() + self.idle_timeout;
                        state.free.push(id, resource, expires_at);
                        self.events.emit(PoolEvent::ObjectAdded { id });
                        self.feed_from_queue(&mut state);
                    }
                }
                Err(error) => {
                    let error = PoolError::CreateFailed(error.to_string());
                    MetricsTracker::record(&self.metrics.create_failures);
                    warn!(pool = %self.name, %error, "resource creation failed");
                    self.events.emit(PoolEvent::CreateError { error });
                    self.schedule_growth(&mut state, self.create_retry_delay);
                }
            }
        }
        self.destroy_all(doomed);
    }

    fn ensure_minimum(self: &Arc<Self>, state: &mut PoolState<F::Resource, Q>) {
        while state.live() < state.min {
            self.create_resource(state);
        }
    }

    /// Create resources for queued requests not yet covered by pending
    /// creations, up to the maximum, then top up to the minimum
    fn grow(self: &Arc<Self>, state: &mut PoolState<F::Resource, Q>) {
        if state.closed {
            return;
        }
        while state.queue.len() > state.pending && state.live() < state.max {
            self.create_resource(state);
        }
        self.ensure_minimum(state);
    }

    /// Arm a single deferred growth pass; further requests collapse into it
    fn schedule_growth(self: &Arc<Self>, state: &mut PoolState<F::Resource, Q>, delay: Duration) {
        if state.growth_scheduled || state.closed {
            return;
        }
        state.growth_scheduled = true;
        let weak = Arc::downgrade(self);
        self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(shared) = weak.upgrade() {
                let mut state = shared.state.lock();
                state.growth_scheduled = false;
                shared.grow(&mut state);
            }
        });
    }

    /// One idle sweep tick; returns whether the sweep should keep running
    fn sweep_idle(&self) -> bool {
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            if state.live() > state.min {
                let now = Instant::now();
                while state.free.len() > state.min {
                    let Some(entry) = state.free.pop_expired(now) else {
                        break;
                    };
                    state.all.remove(&entry.id);
                    MetricsTracker::record(&self.metrics.expired_objects);
                    self.events.emit(PoolEvent::ObjectExpired { id: entry.id });
                    doomed.push(Doomed {
                        id: entry.id,
                        resource: entry.resource,
                        reason: RemovalReason::Expired,
                    });
                }
            }
        }
        self.destroy_all(doomed);
        true
    }

    fn adjust_limits(self: &Arc<Self>, min: usize, max: usize) -> PoolResult<()> {
        validate_limits(min, max)?;
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        state.min = min;
        state.max = max;
        debug!(pool = %self.name, min, max, "pool limits adjusted");
        self.grow(&mut state);
        Ok(())
    }

    fn close(&self) {
        let mut doomed = Vec::new();
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.min = 0;
            state.max = 0;
            state.closed = true;
            info!(
                pool = %self.name,
                busy = state.busy.len(),
                waiting = state.queue.len(),
                "closing pool"
            );
            self.events.emit(PoolEvent::PoolClosed);

            if let Some(handle) = state.idle_sweep.take() {
                handle.abort();
            }
            while let Some(waiter) = state.queue.pop() {
                MetricsTracker::record(&self.metrics.closed_rejections);
                waiter.reject(PoolError::Closed);
            }
            while let Some(entry) = state.free.pop_oldest() {
                state.all.remove(&entry.id);
                doomed.push(Doomed {
                    id: entry.id,
                    resource: entry.resource,
                    reason: RemovalReason::Closed,
                });
            }
            state.queue.close();
        }
        self.destroy_all(doomed);
    }

    fn destroy_all(&self, doomed: Vec<Doomed<F::Resource>>) {
        for Doomed {
            id,
            resource,
            reason,
        } in doomed
        {
            self.factory.destroy(resource);
            MetricsTracker::record(&self.metrics.total_destroyed);
            debug!(pool = %self.name, %id, ?reason, "resource destroyed");
            self.events.emit(PoolEvent::ObjectRemoved { id, reason });
        }
    }
}

fn next_live_waiter<R, Q: WaiterQueue<R>>(queue: &mut Q) -> Option<Waiter<R>> {
    while let Some(waiter) = queue.pop() {
        if !waiter.is_cancelled() {
            return Some(waiter);
        }
    }
    None
}

impl<F: Factory, Q> Drop for Shared<F, Q> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(handle) = state.idle_sweep.take() {
            handle.abort();
        }
        for entry in state.free.drain() {
            self.factory.destroy(entry.resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Counters {
        created: Arc<AtomicUsize>,
        destroyed: Arc<AtomicUsize>,
        failures_left: Arc<AtomicUsize>,
    }

    impl Counters {
        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }

        fn destroyed(&self) -> usize {
            self.destroyed.load(Ordering::SeqCst)
        }
    }

    struct TestFactory {
        counters: Counters,
    }

    #[async_trait]
    impl Factory for TestFactory {
        type Resource = usize;
        type Error = String;

        async fn create(&self) -> Result<usize, String> {
            let failed = self
                .counters
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                return Err("backend unavailable".to_string());
            }
            Ok(self.counters.created.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn destroy(&self, _resource: usize) {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(min: usize, max: usize) -> (ResourcePool<TestFactory>, Counters) {
        let counters = Counters::default();
        let factory = TestFactory {
            counters: counters.clone(),
        };
        let config = PoolConfiguration::new()
            .with_name("test")
            .with_limits(min, max)
            .with_idle_timeout(Duration::from_secs(5))
            .with_idle_check_interval(Duration::from_secs(1));
        (ResourcePool::new(factory, config).unwrap(), counters)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_requires_runtime() {
        let factory = TestFactory {
            counters: Counters::default(),
        };
        let result = ResourcePool::new(factory, PoolConfiguration::default());
        assert!(matches!(result, Err(PoolError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fills_minimum_on_start() {
        let (pool, counters) = pool(2, 4);
        settle().await;

        let status = pool.status();
        assert_eq!(status.size, 2);
        assert_eq!(status.free, 2);
        assert_eq!(status.pending, 0);
        assert_eq!(counters.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_free_resource_goes_first() {
        let (pool, _counters) = pool(2, 2);
        settle().await;

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        assert!(first.id() < second.id());
        assert_eq!(pool.status().busy, 2);

        pool.release(first);
        pool.release(second);
        assert_eq!(pool.status().free, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_growth_passes_coalesce() {
        let (pool, counters) = pool(0, 3);
        let pending: Vec<_> = (0..10).map(|_| pool.acquire()).collect();
        assert!(pool.shared.state.lock().growth_scheduled);
        assert_eq!(pool.status().pending, 0);

        settle().await;
        assert_eq!(counters.created(), 3);
        assert_eq!(pool.status().waiting, 7);
        drop(pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_feeds_waiters_in_order() {
        let (pool, _counters) = pool(1, 1);
        let held = pool.acquire().await.unwrap();
        let held_id = held.id();

        let second = pool.acquire();
        let third = pool.acquire();
        pool.release(held);

        let second = second.await.unwrap();
        assert_eq!(second.id(), held_id);
        assert_eq!(pool.status().waiting, 1);
        drop(second);

        let third = third.await.unwrap();
        assert_eq!(third.id(), held_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_releases() {
        let (pool, _counters) = pool(1, 1);
        {
            let _resource = pool.acquire().await.unwrap();
            assert_eq!(pool.status().busy, 1);
        }
        let status = pool.status();
        assert_eq!(status.busy, 0);
        assert_eq!(status.free, 1);
        assert_eq!(pool.get_metrics().total_released, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_request_is_skipped() {
        let (pool, _counters) = pool(1, 1);
        let held = pool.acquire().await.unwrap();

        let abandoned = pool.acquire();
        let patient = pool.acquire();
        drop(abandoned);
        pool.release(held);

        assert!(patient.await.is_ok());
        assert_eq!(pool.status().waiting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_resource_is_reported() {
        let (pool, _counters) = pool(1, 1);
        let (other, _other_counters) = pool_pair();
        settle().await;
        let mut events = pool.subscribe();

        let foreign = other.acquire().await.unwrap();
        let foreign_id = foreign.id();
        pool.release(foreign);

        assert_eq!(
            events.recv().await.unwrap(),
            PoolEvent::UnknownResource { id: foreign_id }
        );
        // The guard went back to the pool that issued it.
        assert_eq!(other.status().busy, 0);
        assert_eq!(other.status().free, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_bad_resource_is_destroyed_by_its_pool() {
        let (pool, counters) = pool(1, 1);
        let (other, other_counters) = pool_pair();
        settle().await;
        let mut events = pool.subscribe();

        let foreign = other.acquire().await.unwrap();
        let foreign_id = foreign.id();
        pool.remove_bad_object(foreign);

        assert_eq!(
            events.recv().await.unwrap(),
            PoolEvent::UnknownResource { id: foreign_id }
        );
        assert_eq!(counters.destroyed(), 0);
        assert_eq!(other_counters.destroyed(), 1);

        // Never back in service; the issuing pool replaces it instead.
        let status = other.status();
        assert_eq!(status.busy, 0);
        assert_eq!(status.free, 0);
        assert_eq!(status.pending, 1);
        assert_eq!(other.get_metrics().bad_objects, 1);
    }

    fn pool_pair() -> (ResourcePool<TestFactory>, Counters) {
        pool(1, 1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_bad_object_replaces_resource() {
        let (pool, counters) = pool(1, 2);
        let resource = pool.acquire().await.unwrap();
        let mut events = pool.subscribe();
        let bad_id = resource.id();

        pool.remove_bad_object(resource);
        assert_eq!(counters.destroyed(), 1);
        assert_eq!(pool.status().pending, 1);

        let mut seen = Vec::new();
        while seen.len() < 2 {
            seen.push(events.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                PoolEvent::ObjectError { id: bad_id },
                PoolEvent::ObjectRemoved {
                    id: bad_id,
                    reason: RemovalReason::Error
                },
            ]
        );

        settle().await;
        assert_eq!(pool.status().size, 1);
        assert_eq!(counters.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adjust_limits_serves_waiters() {
        let (pool, counters) = pool(0, 1);
        let held = pool.acquire().await.unwrap();
        let waiting = pool.acquire();
        settle().await;
        assert_eq!(pool.status().waiting, 1);

        pool.adjust_limits(0, 2).unwrap();
        let second = waiting.await.unwrap();
        assert_ne!(second.id(), held.id());
        assert_eq!(counters.created(), 2);

        assert_eq!(
            pool.adjust_limits(3, 2),
            Err(PoolError::InvalidLimits { min: 3, max: 2 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lowering_limits_keeps_resources() {
        let (pool, counters) = pool(3, 3);
        settle().await;

        pool.adjust_limits(1, 1).unwrap();
        assert_eq!(pool.status().size, 3);
        assert_eq!(counters.destroyed(), 0);

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(pool.status().size, 1);
        assert_eq!(counters.destroyed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_is_retried() {
        let (pool, counters) = pool(0, 1);
        counters.failures_left.store(2, Ordering::SeqCst);
        let mut events = pool.subscribe();

        let resource = pool.acquire().await.unwrap();
        assert_eq!(*resource, 1);

        let metrics = pool.get_metrics();
        assert_eq!(metrics.create_failures, 2);
        assert_eq!(metrics.total_created, 1);
        assert!(matches!(
            events.recv().await.unwrap(),
            PoolEvent::CreateError {
                error: PoolError::CreateFailed(_)
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_runs_on_later_turn() {
        let (pool, _counters) = pool(1, 1);
        settle().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        pool.acquire_callback(None, move |result| {
            let _ = tx.send(result.map(|resource| resource.id()));
        });
        assert_eq!(pool.status().busy, 1);

        let id = rx.await.unwrap().unwrap();
        assert_eq!(pool.status().busy, 0);
        assert!(id.as_u64() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_creation_finishing_after_close_is_destroyed() {
        let (pool, counters) = pool(2, 2);
        pool.close();
        settle().await;

        assert_eq!(counters.created(), 2);
        assert_eq!(counters.destroyed(), 2);
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_idempotent() {
        let (pool, _counters) = pool(1, 1);
        let mut events = pool.subscribe();
        pool.close();
        pool.close();

        assert_eq!(events.recv().await.unwrap(), PoolEvent::PoolClosed);
        assert!(pool.is_closed());
        assert_eq!(pool.adjust_limits(1, 2), Err(PoolError::Closed));
        assert_eq!(pool.status().max, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_pool_destroys_free_resources() {
        let (pool, counters) = pool(2, 2);
        settle().await;
        drop(pool);
        assert_eq!(counters.destroyed(), 2);
    }
}
