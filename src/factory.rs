//! Resource factory contract

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;

/// Creates and destroys the resources held by a pool.
///
/// `create` may take as long as it needs; the pool counts the resource as
/// pending until it resolves. `destroy` is fire-and-forget and must not block.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Factory;
/// use async_trait::async_trait;
///
/// struct Connector;
///
/// #[async_trait]
/// impl Factory for Connector {
///     type Resource = String;
///     type Error = std::io::Error;
///
///     async fn create(&self) -> Result<String, std::io::Error> {
///         Ok("connection".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait Factory: Send + Sync + 'static {
    type Resource: Send + 'static;
    type Error: Display + Send + 'static;

    /// Produce a new resource
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Tear down a resource the pool no longer needs
    fn destroy(&self, resource: Self::Resource) {
        drop(resource);
    }
}

/// Factory backed by an async closure
pub struct FnFactory<F> {
    create: F,
}

/// Build a [`FnFactory`] from a closure returning a future
///
/// # Examples
///
/// ```
/// use esox_resourcepool::from_fn;
///
/// let factory = from_fn(|| async { Ok::<_, std::io::Error>(42u32) });
/// ```
pub fn from_fn<F>(create: F) -> FnFactory<F> {
    FnFactory { create }
}

#[async_trait]
impl<F, Fut, R, E> Factory for FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Send + 'static,
    E: Display + Send + 'static,
{
    type Resource = R;
    type Error = E;

    async fn create(&self) -> Result<R, E> {
        (self.create)().await
    }
}
