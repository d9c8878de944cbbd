//! In-memory document.
//!
//! A small node store implementing [`Document`]. Used by tests and by hosts
//! that want to render to a string. Cloning a `MemoryDocument` shares the same
//! store, so a test can hand one clone to the renderer and keep another to
//! inspect output and dispatch events.
//!
//! # Example
//!
//! ```ignore
//! let mut doc = MemoryDocument::new();
//! let root = doc.create_element("div");
//! let renderer = Renderer::new(doc.clone());
//! renderer.render(element("p").child("hi").into(), root)?;
//! assert_eq!(doc.inner_html(root), "<p>hi</p>");
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::rc::Rc;

use tracing::{trace, warn};

use super::Document;
use crate::primitives::{Event, Listener};
use crate::types::NodeRef;

// =============================================================================
// Mutation Log
// =============================================================================

/// One mutation issued against a [`MemoryDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateElement { node: NodeRef, tag: String },
    CreateText { node: NodeRef, text: String },
    SetAttribute { node: NodeRef, name: String, value: String },
    RemoveAttribute { node: NodeRef, name: String },
    SetText { node: NodeRef, text: String },
    AddListener { node: NodeRef, event: String },
    RemoveListener { node: NodeRef, event: String },
    Insert { parent: NodeRef, child: NodeRef, before: Option<NodeRef> },
    Remove { parent: NodeRef, child: NodeRef },
}

// =============================================================================
// Storage
// =============================================================================

enum Content {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        listeners: HashMap<String, Listener>,
    },
    Text(String),
}

struct NodeData {
    content: Content,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

#[derive(Default)]
struct Store {
    nodes: HashMap<NodeRef, NodeData>,
    next_id: u64,
    log: Vec<Mutation>,
}

impl Store {
    fn alloc(&mut self, content: Content) -> NodeRef {
        self.next_id += 1;
        let node = NodeRef(self.next_id);
        self.nodes.insert(
            node,
            NodeData {
                content,
                parent: None,
                children: Vec::new(),
            },
        );
        node
    }

    fn detach(&mut self, child: NodeRef) {
        let Some(parent) = self.nodes.get(&child).and_then(|data| data.parent) else {
            return;
        };
        if let Some(data) = self.nodes.get_mut(&parent) {
            data.children.retain(|existing| *existing != child);
        }
        if let Some(data) = self.nodes.get_mut(&child) {
            data.parent = None;
        }
    }

    /// Drop `node` and its descendants from the store.
    fn release(&mut self, node: NodeRef) -> usize {
        self.detach(node);
        let mut released = 0;
        let mut stack = vec![node];
        while let Some(at) = stack.pop() {
            if let Some(data) = self.nodes.remove(&at) {
                stack.extend(data.children);
                released += 1;
            }
        }
        released
    }

    fn write_html(&self, node: NodeRef, out: &mut String) {
        let Some(data) = self.nodes.get(&node) else {
            return;
        };
        match &data.content {
            Content::Text(text) => escape_into(text, out, false),
            Content::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    let _ = write!(out, " {name}=\"");
                    escape_into(value, out, true);
                    out.push('"');
                }
                out.push('>');
                for child in &data.children {
                    self.write_html(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn find(&self, root: NodeRef, tag: &str, found: &mut Vec<NodeRef>) {
        let Some(data) = self.nodes.get(&root) else {
            return;
        };
        for child in &data.children {
            if let Some(Content::Element { tag: child_tag, .. }) =
                self.nodes.get(child).map(|data| &data.content)
            {
                if child_tag == tag {
                    found.push(*child);
                }
            }
            self.find(*child, tag, found);
        }
    }
}

fn escape_into(text: &str, out: &mut String, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

// =============================================================================
// MemoryDocument
// =============================================================================

/// Shared handle to an in-memory node store.
#[derive(Clone, Default)]
pub struct MemoryDocument {
    store: Rc<RefCell<Store>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized children of `node`.
    pub fn inner_html(&self, node: NodeRef) -> String {
        let store = self.store.borrow();
        let mut out = String::new();
        if let Some(data) = store.nodes.get(&node) {
            for child in &data.children {
                store.write_html(*child, &mut out);
            }
        }
        out
    }

    /// Serialized `node` including itself.
    pub fn outer_html(&self, node: NodeRef) -> String {
        let mut out = String::new();
        self.store.borrow().write_html(node, &mut out);
        out
    }

    /// First descendant element of `root` with the given tag, in document order.
    pub fn query_selector(&self, root: NodeRef, tag: &str) -> Option<NodeRef> {
        self.query_selector_all(root, tag).into_iter().next()
    }

    /// Every descendant element of `root` with the given tag, in document order.
    pub fn query_selector_all(&self, root: NodeRef, tag: &str) -> Vec<NodeRef> {
        let mut found = Vec::new();
        self.store.borrow().find(root, tag, &mut found);
        found
    }

    pub fn children(&self, node: NodeRef) -> Vec<NodeRef> {
        self.store
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn attribute(&self, node: NodeRef, name: &str) -> Option<String> {
        let store = self.store.borrow();
        match store.nodes.get(&node).map(|data| &data.content) {
            Some(Content::Element { attributes, .. }) => attributes
                .iter()
                .find(|(existing, _)| existing == name)
                .map(|(_, value)| value.clone()),
            _ => None,
        }
    }

    /// Number of nodes held by the store. Released nodes are not counted.
    pub fn node_count(&self) -> usize {
        self.store.borrow().nodes.len()
    }

    /// Dispatch `event` at `node`, bubbling through its ancestors.
    ///
    /// Returns the number of listeners invoked. Listeners run with the store
    /// unborrowed, so they may set state or even mutate the document.
    pub fn dispatch(&self, node: NodeRef, event: &str) -> usize {
        let path = {
            let store = self.store.borrow();
            let mut path = Vec::new();
            let mut current = Some(node);
            while let Some(at) = current {
                let Some(data) = store.nodes.get(&at) else {
                    break;
                };
                if let Content::Element { listeners, .. } = &data.content {
                    if let Some(listener) = listeners.get(event) {
                        path.push(listener.clone());
                    }
                }
                current = data.parent;
            }
            path
        };

        let event = Event {
            name: event.to_string(),
            target: node,
        };
        for listener in &path {
            listener(&event);
        }
        path.len()
    }

    pub fn click(&self, node: NodeRef) -> usize {
        self.dispatch(node, "click")
    }

    /// Mutations issued so far.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.store.borrow().log.clone()
    }

    /// Mutations issued so far, clearing the log.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.store.borrow_mut().log)
    }
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl Document for MemoryDocument {
    fn create_element(&mut self, tag: &str) -> NodeRef {
        let mut store = self.store.borrow_mut();
        let node = store.alloc(Content::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            listeners: HashMap::new(),
        });
        store.log.push(Mutation::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeRef {
        let mut store = self.store.borrow_mut();
        let node = store.alloc(Content::Text(text.to_string()));
        store.log.push(Mutation::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_attribute(&mut self, node: NodeRef, name: &str, value: &str) {
        let mut store = self.store.borrow_mut();
        if let Some(Content::Element { attributes, .. }) =
            store.nodes.get_mut(&node).map(|data| &mut data.content)
        {
            match attributes.iter_mut().find(|(existing, _)| existing == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
        store.log.push(Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&mut self, node: NodeRef, name: &str) {
        let mut store = self.store.borrow_mut();
        if let Some(Content::Element { attributes, .. }) =
            store.nodes.get_mut(&node).map(|data| &mut data.content)
        {
            attributes.retain(|(existing, _)| existing != name);
        }
        store.log.push(Mutation::RemoveAttribute {
            node,
            name: name.to_string(),
        });
    }

    fn set_text(&mut self, node: NodeRef, text: &str) {
        let mut store = self.store.borrow_mut();
        if let Some(Content::Text(content)) = store.nodes.get_mut(&node).map(|data| &mut data.content)
        {
            *content = text.to_string();
        }
        store.log.push(Mutation::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn add_listener(&mut self, node: NodeRef, event: &str, listener: Listener) {
        let mut store = self.store.borrow_mut();
        if let Some(Content::Element { listeners, .. }) =
            store.nodes.get_mut(&node).map(|data| &mut data.content)
        {
            listeners.insert(event.to_string(), listener);
        }
        store.log.push(Mutation::AddListener {
            node,
            event: event.to_string(),
        });
    }

    fn remove_listener(&mut self, node: NodeRef, event: &str) {
        let mut store = self.store.borrow_mut();
        if let Some(Content::Element { listeners, .. }) =
            store.nodes.get_mut(&node).map(|data| &mut data.content)
        {
            listeners.remove(event);
        }
        store.log.push(Mutation::RemoveListener {
            node,
            event: event.to_string(),
        });
    }

    fn insert_before(&mut self, parent: NodeRef, child: NodeRef, before: Option<NodeRef>) {
        let mut store = self.store.borrow_mut();
        if !store.nodes.contains_key(&parent) || !store.nodes.contains_key(&child) {
            warn!(%parent, %child, "insert_before on unknown node");
            return;
        }
        store.detach(child);

        if let Some(data) = store.nodes.get_mut(&parent) {
            let index = before
                .and_then(|anchor| data.children.iter().position(|existing| *existing == anchor))
                .unwrap_or(data.children.len());
            data.children.insert(index, child);
        }
        if let Some(data) = store.nodes.get_mut(&child) {
            data.parent = Some(parent);
        }
        store.log.push(Mutation::Insert { parent, child, before });
    }

    fn remove_child(&mut self, parent: NodeRef, child: NodeRef) {
        let mut store = self.store.borrow_mut();
        if store.nodes.get(&child).and_then(|data| data.parent) != Some(parent) {
            warn!(%parent, %child, "remove_child on a node that is not a child");
            return;
        }
        store.detach(child);
        store.log.push(Mutation::Remove { parent, child });
    }

    fn release(&mut self, node: NodeRef) {
        let released = self.store.borrow_mut().release(node);
        trace!(%node, released, "nodes released");
    }

    fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.store.borrow().nodes.get(&node).and_then(|data| data.parent)
    }

    fn next_sibling(&self, node: NodeRef) -> Option<NodeRef> {
        let store = self.store.borrow();
        let parent = store.nodes.get(&node)?.parent?;
        let siblings = &store.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|existing| *existing == node)?;
        siblings.get(index + 1).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_inner_html_escapes() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("div");
        let a = doc.create_element("a");
        doc.set_attribute(a, "title", "\"x\" & y");
        let text = doc.create_text("1 < 2");
        doc.insert_before(a, text, None);
        doc.insert_before(root, a, None);

        assert_eq!(
            doc.inner_html(root),
            r#"<a title="&quot;x&quot; &amp; y">1 &lt; 2</a>"#
        );
    }

    #[test]
    fn test_insert_before_moves_existing_child() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("div");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        let c = doc.create_text("c");
        for node in [a, b, c] {
            doc.insert_before(root, node, None);
        }

        doc.insert_before(root, c, Some(a));
        assert_eq!(doc.inner_html(root), "cab");
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(b), None);
    }

    #[test]
    fn test_dispatch_bubbles_and_query_selector() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("div");
        let section = doc.create_element("section");
        let button = doc.create_element("button");
        doc.insert_before(section, button, None);
        doc.insert_before(root, section, None);

        let hits = Rc::new(Cell::new(0));
        for node in [button, section] {
            let hits = hits.clone();
            doc.add_listener(node, "click", Rc::new(move |_: &Event| hits.set(hits.get() + 1)));
        }

        assert_eq!(doc.query_selector(root, "button"), Some(button));
        assert_eq!(doc.click(button), 2);
        assert_eq!(hits.get(), 2);
        assert_eq!(doc.dispatch(button, "input"), 0);
    }

    #[test]
    fn test_release_drops_subtree() {
        let mut doc = MemoryDocument::new();
        let root = doc.create_element("div");
        let list = doc.create_element("ul");
        let item = doc.create_element("li");
        let text = doc.create_text("a");
        doc.insert_before(item, text, None);
        doc.insert_before(list, item, None);
        doc.insert_before(root, list, None);
        doc.take_mutations();

        doc.release(list);
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.inner_html(root), "");
        assert!(doc.take_mutations().is_empty());

        // Unknown nodes are ignored.
        doc.release(list);
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn test_mutation_log() {
        let mut doc = MemoryDocument::new();
        let text = doc.create_text("a");
        doc.take_mutations();

        doc.set_text(text, "b");
        assert_eq!(
            doc.take_mutations(),
            vec![Mutation::SetText {
                node: text,
                text: "b".into()
            }]
        );
        assert!(doc.mutations().is_empty());
    }
}
