//! Context - values published by ancestors, read by descendants.
//!
//! A [`Context<T>`] is an identity plus a default value. Providers publish a
//! value for everything rendered beneath them; consumers read the nearest
//! enclosing value through [`Scope::use_context`](crate::state::Scope::use_context).
//!
//! Both authoring forms build the same descriptor:
//!
//! ```ignore
//! let theme = create_context("light");
//!
//! // Explicit Provider sub-form
//! theme.provider("dark").child(component(content, ()));
//!
//! // The context itself carrying a value
//! theme.with("dark", [component(content, ()).into()]);
//! ```

mod store;

pub use store::*;

use std::any::Any;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::primitives::{Node, ProviderNode};

// =============================================================================
// Context Identity
// =============================================================================

static CONTEXT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity token of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(CONTEXT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

// =============================================================================
// Context Definition
// =============================================================================

/// A context definition: identity token plus default value.
///
/// Cloning shares the identity; providers and consumers built from any clone
/// talk to each other.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

/// Create a new context with a default value.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
    Context {
        id: ContextId::next(),
        default: Rc::new(default),
    }
}

impl<T: 'static> Context<T> {
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Value observed when no provider is above the consumer.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Start a `Provider` descriptor publishing `value`.
    pub fn provider(&self, value: T) -> Provider<T> {
        Provider {
            context: self.clone(),
            value,
            children: Vec::new(),
        }
    }

    /// Use the context itself as a provider of `value` around `children`.
    pub fn with(&self, value: T, children: impl IntoIterator<Item = Node>) -> Node {
        self.provider(value).children(children).into()
    }
}

// =============================================================================
// Provider Builder
// =============================================================================

/// Builder for a provider descriptor.
pub struct Provider<T> {
    context: Context<T>,
    value: T,
    children: Vec<Node>,
}

impl<T: 'static> Provider<T> {
    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

impl<T: 'static> From<Provider<T>> for Node {
    fn from(provider: Provider<T>) -> Self {
        let value: Rc<dyn Any> = Rc::new(provider.value);
        Node::Provider(ProviderNode {
            context: provider.context.id,
            value,
            children: provider.children,
        })
    }
}
