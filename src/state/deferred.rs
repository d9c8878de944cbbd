//! Deferred values - the pending asynchronous dependency a component can read.
//!
//! A [`Deferred<T>`] behaves like a promise: it settles once, with a value or
//! a failure, and every clone observes the same outcome. A render can only see
//! the outcome after the executor has driven the deferred to completion, so
//! even `Deferred::ready(v)` suspends on its first read; the boundary's
//! continuation drives it and the retry observes `v`.
//!
//! # Example
//!
//! ```ignore
//! let (user, resolver) = Deferred::pending();
//!
//! // later, from an event handler or another task:
//! resolver.resolve(String::from("ada"));
//! ```

use std::future::Future;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture, Shared};
use thiserror::Error;

/// Failure outcome of a deferred value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettleError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("resolver dropped before settling")]
    Abandoned,
}

type Settled<T> = Result<T, SettleError>;

// =============================================================================
// Deferred
// =============================================================================

/// A value that settles asynchronously.
pub struct Deferred<T> {
    shared: Shared<LocalBoxFuture<'static, Settled<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// An unsettled value and the handle that settles it.
    pub fn pending() -> (Self, Resolver<T>) {
        let (sender, receiver) = oneshot::channel();
        let future = receiver.map(|outcome| outcome.unwrap_or(Err(SettleError::Abandoned)));
        (Self::wrap(future), Resolver { sender })
    }

    /// A value that is already available, observed after one executor turn.
    pub fn ready(value: T) -> Self {
        Self::wrap(futures::future::ready(Ok(value)))
    }

    /// A value that fails, observed after one executor turn.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::wrap(futures::future::ready(Err(SettleError::Rejected(reason.into()))))
    }

    /// Settles with the output of `future`.
    pub fn from_future(future: impl Future<Output = Settled<T>> + 'static) -> Self {
        Self::wrap(future)
    }

    fn wrap(future: impl Future<Output = Settled<T>> + 'static) -> Self {
        Self {
            shared: future.boxed_local().shared(),
        }
    }

    /// Outcome, if the value has settled and been observed by the executor.
    pub fn peek(&self) -> Option<Settled<T>> {
        self.shared.peek().cloned()
    }

    pub fn is_settled(&self) -> bool {
        self.shared.peek().is_some()
    }

    /// Future completing when the value settles, without the value itself.
    pub(crate) fn settled(&self) -> LocalBoxFuture<'static, Result<(), SettleError>> {
        self.shared.clone().map(|outcome| outcome.map(|_| ())).boxed_local()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Settles a [`Deferred`] created with [`Deferred::pending`].
///
/// Dropping it without settling fails the deferred with
/// [`SettleError::Abandoned`].
pub struct Resolver<T> {
    sender: oneshot::Sender<Settled<T>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        // The receiver lives inside the shared future; it is only gone when
        // every clone of the deferred was dropped, and then nobody is waiting.
        let _ = self.sender.send(Ok(value));
    }

    pub fn reject(self, reason: impl Into<String>) {
        let _ = self.sender.send(Err(SettleError::Rejected(reason.into())));
    }
}

impl<T> std::fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}
