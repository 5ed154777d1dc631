//! # Deferred Resource Values
//!
//! An [`Output<T>`] is a value that becomes known only after the resource
//! that produces it has been provisioned: a generated bucket name, a key
//! id, a service URI.
//!
//! ## Access Model
//!
//! There is deliberately no public accessor for the inner value. Downstream
//! stages derive new outputs with [`Output::map`], [`Output::try_map`],
//! [`Output::zip`] and [`Output::after`]; the closure runs only once every
//! input has resolved. This makes "read before resolve" unrepresentable:
//!
//! ```text
//!   bucket: Output<BucketState> ──┐
//!                                  ├─ zip ─ try_map(build blob) ─▶ Output<String>
//!   coords: Output<KeyCoordinates>┘
//! ```
//!
//! Only the engine resolves outputs, when it submits a create-request or
//! collects the published results of a run.
//!
//! ## Failure Propagation
//!
//! A failed output fails every output derived from it with the same
//! [`Error`]. Closures of derived outputs are never invoked in that case.
//!
//! ## Sharing
//!
//! Outputs are cheap to clone. All clones observe the same single
//! resolution, so a resource referenced by three stages is still created
//! exactly once.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use tokio::task::JoinHandle;

/// A value produced by a resource that may not be provisioned yet.
#[must_use = "outputs do nothing unless consumed by another stage or exported"]
pub struct Output<T> {
    inner: Shared<BoxFuture<'static, Result<T>>>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.inner.peek().is_some() {
            "resolved"
        } else {
            "pending"
        };
        f.debug_struct("Output").field("state", &state).finish()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an output whose value is already known.
    pub fn known(value: T) -> Self {
        Self::from_future(async move { Ok(value) })
    }

    /// Creates an output that has already failed.
    pub fn failed(err: Error) -> Self {
        Self::from_future(async move { Err(err) })
    }

    /// Wraps a future producing the value.
    pub(crate) fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: fut.boxed().shared(),
        }
    }

    /// Wraps a spawned task producing the value.
    pub(crate) fn from_task(handle: JoinHandle<Result<T>>) -> Self {
        Self::from_future(async move {
            handle
                .await
                .map_err(|e| Error::Internal(format!("provisioning task failed: {e}")))?
        })
    }

    /// Derives a new output from the resolved value.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::from_future(async move { inner.await.map(f) })
    }

    /// Derives a new output with a fallible transformation.
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let inner = self.inner.clone();
        Output::from_future(async move { inner.await.and_then(f) })
    }

    /// Combines two outputs; resolves once both have resolved.
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.inner.clone();
        let right = other.inner.clone();
        Output::from_future(async move {
            let (l, r) = futures::future::try_join(left, right).await?;
            Ok((l, r))
        })
    }

    /// Same value, but resolves only after `dependency` has resolved.
    ///
    /// Expresses an ordering edge without a data dependency.
    pub fn after<U>(&self, dependency: &Output<U>) -> Output<T>
    where
        U: Clone + Send + Sync + 'static,
    {
        self.zip(dependency).map(|(value, _)| value)
    }

    /// Waits for the value. Crate-internal: stages never read values
    /// directly.
    pub(crate) async fn resolve(self) -> Result<T> {
        self.inner.await
    }

    /// Returns true if the output has already resolved (successfully or not).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.peek().is_some()
    }
}
