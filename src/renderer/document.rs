//! Document capability - the primitives the engine needs from a host.
//!
//! The engine never inspects nodes; it creates them, mutates them and asks
//! for their position through this trait. Any live document (a browser DOM
//! binding, a terminal widget tree, the in-memory [`MemoryDocument`]) can sit
//! behind it.
//!
//! [`MemoryDocument`]: super::MemoryDocument

use crate::primitives::Listener;
use crate::types::NodeRef;

/// Mutation and query primitives over a live document.
pub trait Document {
    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> NodeRef;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeRef;

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str);

    fn remove_attribute(&mut self, node: NodeRef, name: &str);

    /// Replace the content of a text node.
    fn set_text(&mut self, node: NodeRef, text: &str);

    /// Register `listener` for `event` on `node`, replacing any previous one.
    fn add_listener(&mut self, node: NodeRef, event: &str, listener: Listener);

    fn remove_listener(&mut self, node: NodeRef, event: &str);

    /// Insert `child` into `parent` before `before`, or append when `before`
    /// is `None`. A child that is already attached elsewhere is moved.
    fn insert_before(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>);

    fn remove_child(&mut self, parent: NodeRef, child: NodeRef);

    /// The engine will never use `node` or its descendants again. Called
    /// after the node was removed from its parent, or for a node that was
    /// never attached.
    fn release(&mut self, node: NodeRef) {
        let _ = node;
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef>;

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef>;
}
