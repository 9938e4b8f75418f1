//! Checked-out resources and their identities

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pooled resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceId(u64);

impl ResourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a guard hands its resource back to the issuing pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Checkin {
    Release,
    /// The holder reported the resource broken
    Discard,
}

pub(crate) type ReturnFn<R> = Arc<dyn Fn(ResourceId, R, Checkin) + Send + Sync>;

/// A busy resource. Dropping it releases the resource back to its pool.
///
/// Use [`ResourcePool::release`](crate::ResourcePool::release) to return it
/// explicitly, or [`ResourcePool::remove_bad_object`](crate::ResourcePool::remove_bad_object)
/// when the resource turned out to be broken.
pub struct Pooled<R> {
    resource: Option<R>,
    id: ResourceId,
    return_fn: ReturnFn<R>,
}

impl<R> Pooled<R> {
    pub(crate) fn new(resource: R, id: ResourceId, return_fn: ReturnFn<R>) -> Self {
        Self {
            resource: Some(resource),
            id,
            return_fn,
        }
    }

    /// Identity of the held resource
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Whether this guard was issued by the pool owning `return_fn`
    pub(crate) fn returns_to(&self, return_fn: &ReturnFn<R>) -> bool {
        Arc::ptr_eq(&self.return_fn, return_fn)
    }

    /// Hand the resource back to the issuing pool as broken
    pub(crate) fn discard(mut self) {
        if let Some(resource) = self.resource.take() {
            (self.return_fn)(self.id, resource, Checkin::Discard);
        }
    }

    /// Disarm the guard, handing back the identity and the resource
    pub(crate) fn into_parts(mut self) -> (ResourceId, R) {
        let resource = self.resource.take().expect("Resource already taken");
        (self.id, resource)
    }
}

impl<R> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Resource already taken")
    }
}

impl<R> DerefMut for Pooled<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Resource already taken")
    }
}

impl<R> Drop for Pooled<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            (self.return_fn)(self.id, resource, Checkin::Release);
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Pooled<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    type Returned = Arc<Mutex<Vec<(ResourceId, u32, Checkin)>>>;

    fn recording() -> (ReturnFn<u32>, Returned) {
        let returned = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&returned);
        let return_fn: ReturnFn<u32> =
            Arc::new(move |id, value, checkin| sink.lock().push((id, value, checkin)));
        (return_fn, returned)
    }

    #[test]
    fn test_drop_returns_resource() {
        let (return_fn, returned) = recording();
        let id = ResourceId::next();
        {
            let mut pooled = Pooled::new(5, id, return_fn);
            *pooled += 1;
            assert_eq!(*pooled, 6);
        }
        assert_eq!(*returned.lock(), vec![(id, 6, Checkin::Release)]);
    }

    #[test]
    fn test_into_parts_disarms() {
        let (return_fn, returned) = recording();
        let id = ResourceId::next();
        let pooled = Pooled::new(9, id, return_fn);
        assert_eq!(pooled.into_parts(), (id, 9));
        assert!(returned.lock().is_empty());
    }

    #[test]
    fn test_discard_reports_broken_resource() {
        let (return_fn, returned) = recording();
        let id = ResourceId::next();
        Pooled::new(3, id, return_fn).discard();
        assert_eq!(*returned.lock(), vec![(id, 3, Checkin::Discard)]);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("#{}", a.as_u64()));
    }
}
