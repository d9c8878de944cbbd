//! Commit queue - buffered document mutations.
//!
//! A render pass records every mutation here instead of touching the
//! document. When the pass succeeds the queue is applied in order in one go;
//! when it fails the queue is dropped and the live document keeps its
//! previous output. Node creation is the only thing that happens immediately:
//! detached nodes are invisible.
//!
//! Placement is recorded as an op too. It compares each node's current
//! position with where it should be and only moves what is out of place,
//! so a pass that changed nothing structural issues no inserts.

use tracing::trace;

use super::Document;
use crate::primitives::Listener;
use crate::types::NodeRef;

// =============================================================================
// Ops
// =============================================================================

enum Op {
    SetAttribute { node: NodeRef, name: String, value: String },
    RemoveAttribute { node: NodeRef, name: String },
    SetText { node: NodeRef, text: String },
    AddListener { node: NodeRef, event: String, listener: Listener },
    RemoveListener { node: NodeRef, event: String },
    Detach { node: NodeRef },
    Place { parent: NodeRef, nodes: Vec<NodeRef>, anchor: Option<NodeRef> },
}

// =============================================================================
// CommitQueue
// =============================================================================

/// Mutations accumulated by one render pass.
#[derive(Default)]
pub struct CommitQueue {
    ops: Vec<Op>,
}

impl CommitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) {
        self.ops.push(Op::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn remove_attribute(&mut self, node: NodeRef, name: &str) {
        self.ops.push(Op::RemoveAttribute {
            node,
            name: name.to_string(),
        });
    }

    pub fn set_text(&mut self, node: NodeRef, text: &str) {
        self.ops.push(Op::SetText {
            node,
            text: text.to_string(),
        });
    }

    pub fn add_listener(&mut self, node: NodeRef, event: &str, listener: Listener) {
        self.ops.push(Op::AddListener {
            node,
            event: event.to_string(),
            listener,
        });
    }

    pub fn remove_listener(&mut self, node: NodeRef, event: &str) {
        self.ops.push(Op::RemoveListener {
            node,
            event: event.to_string(),
        });
    }

    /// Remove `node` from whatever parent it has when the queue is applied,
    /// then release it.
    pub fn detach(&mut self, node: NodeRef) {
        self.ops.push(Op::Detach { node });
    }

    /// Make `nodes` the consecutive children of `parent` ending right before
    /// `anchor` (or at the end when `anchor` is `None`).
    pub fn place(&mut self, parent: NodeRef, nodes: Vec<NodeRef>, anchor: Option<NodeRef>) {
        if nodes.is_empty() {
            return;
        }
        self.ops.push(Op::Place { parent, nodes, anchor });
    }

    /// Apply every recorded op to `document`, in order.
    ///
    /// Returns the number of document mutations issued.
    pub fn apply(self, document: &mut dyn Document) -> usize {
        let mut mutations = 0;

        for op in self.ops {
            match op {
                Op::SetAttribute { node, name, value } => {
                    document.set_attribute(node, &name, &value);
                    mutations += 1;
                }
                Op::RemoveAttribute { node, name } => {
                    document.remove_attribute(node, &name);
                    mutations += 1;
                }
                Op::SetText { node, text } => {
                    document.set_text(node, &text);
                    mutations += 1;
                }
                Op::AddListener { node, event, listener } => {
                    document.add_listener(node, &event, listener);
                    mutations += 1;
                }
                Op::RemoveListener { node, event } => {
                    document.remove_listener(node, &event);
                    mutations += 1;
                }
                Op::Detach { node } => {
                    if let Some(parent) = document.parent(node) {
                        document.remove_child(parent, node);
                        mutations += 1;
                    }
                    document.release(node);
                }
                Op::Place { parent, nodes, anchor } => {
                    // Walk backwards so each node only needs its successor to
                    // already be in place.
                    let mut next = anchor;
                    for node in nodes.into_iter().rev() {
                        let in_place = document.parent(node) == Some(parent)
                            && document.next_sibling(node) == next;
                        if !in_place {
                            document.insert_before(parent, node, next);
                            mutations += 1;
                        }
                        next = Some(node);
                    }
                }
            }
        }

        trace!(mutations, "commit applied");
        mutations
    }
}
