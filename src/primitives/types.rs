//! Descriptor types - what should exist, not yet materialized.
//!
//! Descriptors are plain data. The engine walks them top-down and diffs them
//! against the committed fiber tree; nothing here touches the document.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::context::ContextId;
use crate::error::Interrupt;
use crate::state::Scope;
use crate::types::{ComponentId, Key, NodeRef};

// =============================================================================
// Callback Types
// =============================================================================

/// Event delivered to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event name, e.g. `"click"`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeRef,
}

/// Event listener callback.
///
/// `Rc<dyn Fn>` so a listener can be cloned into the proxy the engine
/// installs on the document node.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Result of a component body.
pub type Render = Result<Node, Interrupt>;

/// Type-erased component body with its input values already captured.
pub type RenderFn = Rc<dyn Fn(&mut Scope<'_>) -> Render>;

// =============================================================================
// Node
// =============================================================================

/// A node descriptor.
#[derive(Clone, Default)]
pub enum Node {
    /// Renders nothing but still occupies a child position.
    #[default]
    Empty,
    /// A text node.
    Text(String),
    /// A native element.
    Element(Element),
    /// A list of siblings without a wrapper element.
    Fragment(Vec<Node>),
    /// A component invocation.
    Component(ComponentNode),
    /// A context provider.
    Provider(ProviderNode),
    /// A suspense boundary.
    Suspense(SuspenseNode),
}

impl Node {
    /// Explicit key, if the descriptor carries one.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Node::Element(element) => element.key.as_ref(),
            Node::Component(component) => component.key.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(element) => element.fmt(f),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Node::Component(component) => f
                .debug_struct("Component")
                .field("name", &component.name)
                .field("key", &component.key)
                .finish(),
            Node::Provider(provider) => f
                .debug_struct("Provider")
                .field("context", &provider.context)
                .field("children", &provider.children)
                .finish(),
            Node::Suspense(suspense) => f
                .debug_struct("Suspense")
                .field("fallback", &suspense.fallback)
                .field("children", &suspense.children)
                .finish(),
        }
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Fragment(children)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        node.map_or(Node::Empty, Into::into)
    }
}

// =============================================================================
// Element
// =============================================================================

/// Native element descriptor.
#[derive(Clone)]
pub struct Element {
    pub(crate) tag: String,
    pub(crate) key: Option<Key>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) listeners: Vec<(String, Listener)>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            key: None,
            attributes: Vec::new(),
            listeners: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set an attribute. A later call with the same name wins.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
        self
    }

    /// Attach a listener for `event`. A later call with the same event wins.
    pub fn on(mut self, event: impl Into<String>, listener: impl Fn(&Event) + 'static) -> Self {
        let event = event.into();
        let listener: Listener = Rc::new(listener);
        match self.listeners.iter_mut().find(|(existing, _)| *existing == event) {
            Some(slot) => slot.1 = listener,
            None => self.listeners.push((event, listener)),
        }
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<&str> = self.listeners.iter().map(|(event, _)| event.as_str()).collect();
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .field("listeners", &events)
            .field("children", &self.children)
            .finish()
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

// =============================================================================
// Component, Provider, Suspense
// =============================================================================

/// Component invocation: identity of the function plus its captured inputs.
#[derive(Clone)]
pub struct ComponentNode {
    pub(crate) id: ComponentId,
    pub(crate) name: &'static str,
    pub(crate) key: Option<Key>,
    pub(crate) render: RenderFn,
}

impl ComponentNode {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl From<ComponentNode> for Node {
    fn from(component: ComponentNode) -> Self {
        Node::Component(component)
    }
}

/// Provider descriptor. Built through [`Context::provider`](crate::context::Context::provider)
/// or [`Context::with`](crate::context::Context::with).
#[derive(Clone)]
pub struct ProviderNode {
    pub(crate) context: ContextId,
    pub(crate) value: Rc<dyn Any>,
    pub(crate) children: Vec<Node>,
}

/// Suspense boundary descriptor.
#[derive(Clone, Debug)]
pub struct SuspenseNode {
    pub(crate) fallback: Box<Node>,
    pub(crate) children: Box<Node>,
}
