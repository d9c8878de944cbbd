//! Context Store - provider frame chain for one render pass.
//!
//! Frames form a singly linked list that mirrors the render call stack, not
//! the document tree. The store owns only the innermost frame; a snapshot is
//! an `Rc` to it and stays valid after the pass ends, which is what lets the
//! engine re-render an instance later under exactly the providers that were
//! above it.

use std::any::Any;
use std::rc::Rc;

use super::{Context, ContextId};
use crate::error::RenderError;

// =============================================================================
// Frames
// =============================================================================

/// One provider frame: a value published for a context identity.
pub struct ProviderFrame {
    context: ContextId,
    value: Rc<dyn Any>,
    parent: Option<Rc<ProviderFrame>>,
}

impl ProviderFrame {
    pub fn context(&self) -> ContextId {
        self.context
    }
}

/// Immutable snapshot of a provider chain.
#[derive(Clone, Default)]
pub struct ContextChain(Option<Rc<ProviderFrame>>);

impl ContextChain {
    /// Chain with no providers (every read observes the default).
    pub fn empty() -> Self {
        Self(None)
    }

    /// Nearest value published for `context`, if any.
    pub fn lookup(&self, context: ContextId) -> Option<&Rc<dyn Any>> {
        let mut frame = self.0.as_ref();
        while let Some(current) = frame {
            if current.context == context {
                return Some(&current.value);
            }
            frame = current.parent.as_ref();
        }
        None
    }

    /// Number of frames in the chain.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut frame = self.0.as_ref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_ref();
        }
        depth
    }

    /// True if both snapshots point at the same innermost frame.
    pub fn same_as(&self, other: &ContextChain) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl std::fmt::Debug for ContextChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids = Vec::new();
        let mut frame = self.0.as_ref();
        while let Some(current) = frame {
            ids.push(current.context);
            frame = current.parent.as_ref();
        }
        f.debug_tuple("ContextChain").field(&ids).finish()
    }
}

/// Handle returned by [`ContextStore::push_provider`]; consumed by `pop`.
#[must_use = "a pushed provider frame must be popped"]
pub struct FrameHandle {
    frame: Rc<ProviderFrame>,
}

// =============================================================================
// Store
// =============================================================================

/// Stack-scoped context values for the active render pass.
#[derive(Debug, Default)]
pub struct ContextStore {
    current: ContextChain,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `value` the nearest value for `context` until the matching pop.
    pub fn push_provider(&mut self, context: ContextId, value: Rc<dyn Any>) -> FrameHandle {
        let frame = Rc::new(ProviderFrame {
            context,
            value,
            parent: self.current.0.clone(),
        });
        self.current = ContextChain(Some(frame.clone()));
        FrameHandle { frame }
    }

    /// Restore the chain that was in effect before `frame` was pushed.
    ///
    /// Frames must be popped innermost first.
    pub fn pop(&mut self, frame: FrameHandle) -> Result<(), RenderError> {
        match &self.current.0 {
            Some(top) if Rc::ptr_eq(top, &frame.frame) => {
                self.current = ContextChain(frame.frame.parent.clone());
                Ok(())
            }
            _ => Err(RenderError::ContextImbalance),
        }
    }

    /// Nearest pushed value for `context`, or its default.
    pub fn read<T: Clone + 'static>(&self, context: &Context<T>) -> T {
        self.current
            .lookup(context.id())
            .and_then(|value| value.downcast_ref::<T>())
            .unwrap_or_else(|| context.default_value())
            .clone()
    }

    /// Capture the current chain.
    pub fn snapshot(&self) -> ContextChain {
        self.current.clone()
    }

    /// Replace the current chain, returning the previous one.
    pub fn restore(&mut self, chain: ContextChain) -> ContextChain {
        std::mem::replace(&mut self.current, chain)
    }
}
