//! Error taxonomy for render passes.
//!
//! - [`PendingSignal`] is control flow: a component could not finish because a
//!   deferred value has not settled. Only suspense boundaries catch it.
//! - [`RenderError`] is fatal for the pass (or, for settlement failures, for
//!   the boundary). It is returned to the caller of `render`/`update` or from
//!   `Renderer::run_microtasks` for work that ran on the executor.
//! - Stale updates (an instance that unmounted before its flush) are not
//!   errors; they are dropped and logged at trace level.

use std::fmt;

use futures::future::LocalBoxFuture;
use thiserror::Error;

use crate::state::SettleError;
use crate::types::FiberId;

// =============================================================================
// Render Errors
// =============================================================================

/// Fatal error raised while rendering or committing.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A component body failed.
    #[error("component `{component}` failed: {message}")]
    Thrown {
        component: &'static str,
        message: String,
    },

    /// A hook slot was read with a different type than it was created with.
    #[error("component `{component}` called hooks in a different order: slot {slot} was created as `{expected}`, read as `{found}`")]
    HookMismatch {
        component: &'static str,
        slot: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// A completed instance declared a different number of hook slots.
    #[error("component `{component}` declared {found} hook slots, previous render declared {expected}")]
    HookCount {
        component: &'static str,
        expected: usize,
        found: usize,
    },

    /// A component suspended with no suspense boundary above it.
    #[error("component `{component}` suspended outside of any suspense boundary")]
    UnhandledSuspend { component: &'static str },

    /// A deferred value settled with a failure.
    #[error("deferred value failed to settle: {0}")]
    Settlement(#[from] SettleError),

    /// A provider frame was popped out of order.
    #[error("provider frames popped out of order")]
    ContextImbalance,

    /// The engine lost track of a fiber it expected to exist.
    #[error("fiber {0} is not part of the committed tree")]
    MissingInstance(FiberId),

    /// A render or update was started while another pass was active.
    #[error("render pass started while another pass is active")]
    Reentrant,
}

// =============================================================================
// Pending Signal
// =============================================================================

/// Raised by a component that read a deferred value which has not settled.
///
/// Carries the dependency the nearest suspense boundary must wait for before
/// retrying its children.
pub struct PendingSignal {
    pub(crate) component: &'static str,
    pub(crate) dependency: LocalBoxFuture<'static, Result<(), SettleError>>,
}

impl PendingSignal {
    pub(crate) fn new(
        component: &'static str,
        dependency: LocalBoxFuture<'static, Result<(), SettleError>>,
    ) -> Self {
        Self { component, dependency }
    }

    /// Name of the component that suspended.
    pub fn component(&self) -> &'static str {
        self.component
    }
}

impl fmt::Debug for PendingSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSignal")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Interrupt
// =============================================================================

/// Error path of a component body: suspend, or fail the pass.
///
/// Both [`PendingSignal`] and [`RenderError`] convert into `Interrupt`, so a
/// component can use `?` on hook results and deferred reads alike.
#[derive(Debug)]
pub enum Interrupt {
    Suspend(PendingSignal),
    Fail(RenderError),
}

impl From<PendingSignal> for Interrupt {
    fn from(signal: PendingSignal) -> Self {
        Interrupt::Suspend(signal)
    }
}

impl From<RenderError> for Interrupt {
    fn from(error: RenderError) -> Self {
        Interrupt::Fail(error)
    }
}

impl From<SettleError> for Interrupt {
    fn from(error: SettleError) -> Self {
        Interrupt::Fail(RenderError::Settlement(error))
    }
}
