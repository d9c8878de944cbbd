//! Fiber Tree - the committed output of every mounted root.
//!
//! Fibers live in an arena keyed by [`FiberId`]. Ids are allocated from a
//! monotonic counter and never reused, so an id held by a setter or a
//! suspense continuation after its fiber was destroyed is detectably stale.
//!
//! Only element and text fibers own a document node. Every other kind
//! (component, provider, fragment, suspense, empty) contributes the host
//! nodes of its children, in order, to the nearest host ancestor.
//!
//! While a pass runs the tree keeps a [`Journal`]: the first time a fiber
//! is mutated or removed its previous state is saved, and every fiber the
//! pass creates is recorded. A failed pass rolls the tree back to exactly
//! the committed state, matching the document it was never allowed to touch.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::context::{ContextChain, ContextId};
use crate::error::RenderError;
use crate::primitives::{Listener, Node, RenderFn};
use crate::state::HookSlot;
use crate::types::{ComponentId, FiberId, Key, NodeRef};

// =============================================================================
// Flags
// =============================================================================

bitflags::bitflags! {
    /// Per-fiber scheduling state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiberFlags: u8 {
        /// Queued for re-render in the running flush.
        const DIRTY = 1 << 0;
        /// A component that has finished at least one render.
        const COMPLETED = 1 << 1;
    }
}

// =============================================================================
// Fiber Kinds
// =============================================================================

/// Handlers currently bound to an element, read by its document proxies.
pub(crate) type ListenerTable = Rc<RefCell<HashMap<String, Listener>>>;

#[derive(Clone)]
pub(crate) struct ComponentFiber {
    pub id: ComponentId,
    pub name: &'static str,
    pub render: RenderFn,
    pub hooks: Vec<HookSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoundaryStatus {
    /// Children are committed.
    Resolved,
    /// Fallback is committed; a continuation is waiting.
    Pending,
}

#[derive(Clone)]
pub(crate) struct Boundary {
    pub fallback: Node,
    pub children: Node,
    pub status: BoundaryStatus,
    /// Bumped on every suspension; a continuation carrying an older epoch is
    /// ignored.
    pub epoch: u64,
}

#[derive(Clone)]
pub(crate) enum FiberKind {
    Root,
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        listeners: ListenerTable,
    },
    Text(String),
    Fragment,
    Empty,
    Component(ComponentFiber),
    Provider {
        context: ContextId,
        value: Rc<dyn Any>,
    },
    Suspense(Boundary),
}

impl FiberKind {
    /// Whether this fiber's children are document children of its own node.
    fn is_host_parent(&self) -> bool {
        matches!(self, FiberKind::Root | FiberKind::Element { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            FiberKind::Root => "root",
            FiberKind::Element { .. } => "element",
            FiberKind::Text(_) => "text",
            FiberKind::Fragment => "fragment",
            FiberKind::Empty => "empty",
            FiberKind::Component(_) => "component",
            FiberKind::Provider { .. } => "provider",
            FiberKind::Suspense(_) => "suspense",
        }
    }
}

// =============================================================================
// Fiber
// =============================================================================

#[derive(Clone)]
pub(crate) struct Fiber {
    pub kind: FiberKind,
    pub parent: Option<FiberId>,
    pub children: Vec<FiberId>,
    /// Document node owned by this fiber (elements, text, the root target).
    pub host: Option<NodeRef>,
    /// Provider chain in effect at this fiber's position.
    pub context: ContextChain,
    pub depth: usize,
    pub key: Option<Key>,
    pub flags: FiberFlags,
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("kind", &self.kind.label())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("host", &self.host)
            .field("depth", &self.depth)
            .field("flags", &self.flags)
            .finish()
    }
}

// =============================================================================
// Journal
// =============================================================================

/// A fiber as it was before the running pass first touched it.
struct Saved {
    fiber: Fiber,
    /// Handlers of an element fiber. The table is shared with the document
    /// proxies, so it is restored in place rather than replaced.
    listeners: Option<HashMap<String, Listener>>,
}

impl Saved {
    fn of(fiber: Fiber) -> Self {
        let listeners = match &fiber.kind {
            FiberKind::Element { listeners, .. } => Some(listeners.borrow().clone()),
            _ => None,
        };
        Self { fiber, listeners }
    }
}

/// Undo log of one pass.
#[derive(Default)]
struct Journal {
    created: HashSet<FiberId>,
    saved: HashMap<FiberId, Saved>,
}

impl Journal {
    fn needs_save(&self, id: FiberId) -> bool {
        !self.created.contains(&id) && !self.saved.contains_key(&id)
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Arena of committed fibers plus the mount-target index.
#[derive(Default)]
pub(crate) struct Tree {
    fibers: HashMap<FiberId, Fiber>,
    roots: HashMap<NodeRef, FiberId>,
    next_id: u64,
    journal: Option<Journal>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Journaling
    // -------------------------------------------------------------------------

    /// Start recording changes so they can be rolled back.
    pub fn begin(&mut self) {
        self.journal = Some(Journal::default());
    }

    /// Keep every change recorded since `begin`.
    pub fn keep(&mut self) {
        self.journal = None;
    }

    /// Undo every change recorded since `begin`. Returns the number of
    /// fibers restored or discarded.
    ///
    /// Ids handed out in the meantime stay consumed.
    pub fn rollback(&mut self) -> usize {
        let Some(journal) = self.journal.take() else {
            return 0;
        };
        let touched = journal.created.len() + journal.saved.len();

        for id in journal.created {
            self.fibers.remove(&id);
        }
        for (id, saved) in journal.saved {
            if let (FiberKind::Element { listeners, .. }, Some(handlers)) =
                (&saved.fiber.kind, saved.listeners)
            {
                *listeners.borrow_mut() = handlers;
            }
            self.fibers.insert(id, saved.fiber);
        }
        touched
    }

    /// Allocate a fiber under `parent`. The caller links it into the
    /// parent's child list.
    pub fn insert(
        &mut self,
        kind: FiberKind,
        parent: Option<FiberId>,
        context: ContextChain,
        key: Option<Key>,
    ) -> FiberId {
        self.next_id += 1;
        let id = FiberId(self.next_id);
        let depth = parent
            .and_then(|parent| self.fibers.get(&parent))
            .map_or(0, |parent| parent.depth + 1);

        self.fibers.insert(
            id,
            Fiber {
                kind,
                parent,
                children: Vec::new(),
                host: None,
                context,
                depth,
                key,
                flags: FiberFlags::empty(),
            },
        );
        if let Some(journal) = &mut self.journal {
            journal.created.insert(id);
        }
        id
    }

    pub fn contains(&self, id: FiberId) -> bool {
        self.fibers.contains_key(&id)
    }

    pub fn get(&self, id: FiberId) -> Result<&Fiber, RenderError> {
        self.fibers.get(&id).ok_or(RenderError::MissingInstance(id))
    }

    pub fn get_mut(&mut self, id: FiberId) -> Result<&mut Fiber, RenderError> {
        let fiber = self
            .fibers
            .get_mut(&id)
            .ok_or(RenderError::MissingInstance(id))?;
        if let Some(journal) = &mut self.journal {
            if journal.needs_save(id) {
                journal.saved.insert(id, Saved::of(fiber.clone()));
            }
        }
        Ok(fiber)
    }

    // -------------------------------------------------------------------------
    // Roots
    // -------------------------------------------------------------------------

    pub fn root_at(&self, target: NodeRef) -> Option<FiberId> {
        self.roots.get(&target).copied()
    }

    pub fn add_root(&mut self, target: NodeRef, id: FiberId) {
        self.roots.insert(target, id);
    }

    pub fn remove_root(&mut self, target: NodeRef) -> Option<FiberId> {
        self.roots.remove(&target)
    }

    // -------------------------------------------------------------------------
    // Host Queries
    // -------------------------------------------------------------------------

    /// Top-level document nodes produced by `id`, in order.
    ///
    /// For an element or text fiber that is its own node; for anything else,
    /// the concatenated top-level nodes of its children.
    pub fn collect_hosts(&self, id: FiberId) -> Vec<NodeRef> {
        let mut hosts = Vec::new();
        self.collect_into(id, &mut hosts);
        hosts
    }

    fn collect_into(&self, id: FiberId, hosts: &mut Vec<NodeRef>) {
        let Some(fiber) = self.fibers.get(&id) else {
            return;
        };
        match fiber.kind {
            FiberKind::Element { .. } | FiberKind::Text(_) => hosts.extend(fiber.host),
            _ => {
                for child in &fiber.children {
                    self.collect_into(*child, hosts);
                }
            }
        }
    }

    fn first_host(&self, id: FiberId) -> Option<NodeRef> {
        let fiber = self.fibers.get(&id)?;
        match fiber.kind {
            FiberKind::Element { .. } | FiberKind::Text(_) => fiber.host,
            _ => fiber.children.iter().find_map(|child| self.first_host(*child)),
        }
    }

    /// Document node that `id`'s top-level nodes are children of.
    pub fn host_parent(&self, id: FiberId) -> Option<NodeRef> {
        let mut current = self.fibers.get(&id)?.parent;
        while let Some(parent_id) = current {
            let parent = self.fibers.get(&parent_id)?;
            if parent.kind.is_host_parent() {
                return parent.host;
            }
            current = parent.parent;
        }
        None
    }

    /// First document node after everything `id` produces, within the same
    /// host parent. `None` means `id`'s output ends its parent's child list.
    pub fn next_host_after(&self, id: FiberId) -> Option<NodeRef> {
        let mut current = id;
        loop {
            let parent_id = self.fibers.get(&current)?.parent?;
            let parent = self.fibers.get(&parent_id)?;
            let position = parent.children.iter().position(|child| *child == current)?;

            let later = parent.children[position + 1..]
                .iter()
                .find_map(|sibling| self.first_host(*sibling));
            if later.is_some() {
                return later;
            }
            if parent.kind.is_host_parent() {
                return None;
            }
            current = parent_id;
        }
    }

    // -------------------------------------------------------------------------
    // Ancestry
    // -------------------------------------------------------------------------

    /// Nearest suspense boundary above `id` whose children contain it.
    ///
    /// A boundary showing its fallback does not catch suspensions raised
    /// inside that fallback; those go further out.
    pub fn nearest_boundary(&self, id: FiberId) -> Option<FiberId> {
        let mut current = self.fibers.get(&id)?.parent;
        while let Some(ancestor_id) = current {
            let ancestor = self.fibers.get(&ancestor_id)?;
            if let FiberKind::Suspense(boundary) = &ancestor.kind {
                if boundary.status == BoundaryStatus::Resolved {
                    return Some(ancestor_id);
                }
            }
            current = ancestor.parent;
        }
        None
    }

    /// Drop `id` and all its descendants from the arena.
    ///
    /// Does not unlink `id` from its parent and issues no document
    /// mutations; the reconciler does both.
    pub fn remove_subtree(&mut self, id: FiberId) -> usize {
        let mut stack = vec![id];
        let mut removed = 0;
        while let Some(current) = stack.pop() {
            if let Some(fiber) = self.fibers.remove(&current) {
                stack.extend(fiber.children.iter().copied());
                removed += 1;
                if let Some(journal) = &mut self.journal {
                    if journal.needs_save(current) {
                        journal.saved.insert(current, Saved::of(fiber));
                    }
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Event;

    fn element(tag: &str) -> FiberKind {
        FiberKind::Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            listeners: ListenerTable::default(),
        }
    }

    /// root(n0) -> [fragment -> [p(n1), text(n2)], empty, span(n3)]
    fn sample() -> (Tree, [FiberId; 6]) {
        let mut tree = Tree::new();
        let chain = ContextChain::empty();
        let root = tree.insert(FiberKind::Root, None, chain.clone(), None);
        tree.get_mut(root).unwrap().host = Some(NodeRef(0));

        let fragment = tree.insert(FiberKind::Fragment, Some(root), chain.clone(), None);
        let p = tree.insert(element("p"), Some(fragment), chain.clone(), None);
        let text = tree.insert(FiberKind::Text("x".into()), Some(fragment), chain.clone(), None);
        let empty = tree.insert(FiberKind::Empty, Some(root), chain.clone(), None);
        let span = tree.insert(element("span"), Some(root), chain, None);

        tree.get_mut(p).unwrap().host = Some(NodeRef(1));
        tree.get_mut(text).unwrap().host = Some(NodeRef(2));
        tree.get_mut(span).unwrap().host = Some(NodeRef(3));
        tree.get_mut(fragment).unwrap().children = vec![p, text];
        tree.get_mut(root).unwrap().children = vec![fragment, empty, span];

        (tree, [root, fragment, p, text, empty, span])
    }

    #[test]
    fn test_ids_are_never_reused() {
        let (mut tree, [_, fragment, ..]) = sample();
        assert_eq!(tree.remove_subtree(fragment), 3);
        assert!(!tree.contains(fragment));

        let fresh = tree.insert(FiberKind::Empty, None, ContextChain::empty(), None);
        assert!(fresh.as_u64() > fragment.as_u64());
        assert!(matches!(
            tree.get(fragment),
            Err(RenderError::MissingInstance(id)) if id == fragment
        ));
    }

    #[test]
    fn test_host_queries() {
        let (tree, [root, fragment, p, text, empty, span]) = sample();

        assert_eq!(tree.collect_hosts(root), vec![NodeRef(1), NodeRef(2), NodeRef(3)]);
        assert_eq!(tree.collect_hosts(fragment), vec![NodeRef(1), NodeRef(2)]);
        assert_eq!(tree.host_parent(text), Some(NodeRef(0)));

        assert_eq!(tree.next_host_after(p), Some(NodeRef(2)));
        assert_eq!(tree.next_host_after(text), Some(NodeRef(3)));
        assert_eq!(tree.next_host_after(empty), Some(NodeRef(3)));
        assert_eq!(tree.next_host_after(span), None);
        assert_eq!(tree.get(span).unwrap().depth, 1);
    }

    #[test]
    fn test_rollback_restores_committed_state() {
        let (mut tree, [root, fragment, p, text, _, span]) = sample();
        let handler: Listener = Rc::new(|_: &Event| {});
        if let FiberKind::Element { listeners, .. } = &tree.get(span).unwrap().kind {
            listeners.borrow_mut().insert("click".into(), handler);
        }

        tree.begin();
        tree.get_mut(root).unwrap().children.clear();
        tree.remove_subtree(fragment);
        if let FiberKind::Element { listeners, .. } = &tree.get_mut(span).unwrap().kind {
            listeners.borrow_mut().clear();
        }
        let added = tree.insert(FiberKind::Empty, Some(root), ContextChain::empty(), None);
        tree.get_mut(added).unwrap().depth = 9;

        // One created fiber plus root, span and the three removed fibers.
        assert_eq!(tree.rollback(), 6);
        assert!(!tree.contains(added));
        assert_eq!(tree.collect_hosts(root), vec![NodeRef(1), NodeRef(2), NodeRef(3)]);
        assert!(tree.contains(p) && tree.contains(text));
        match &tree.get(span).unwrap().kind {
            FiberKind::Element { listeners, .. } => assert!(listeners.borrow().contains_key("click")),
            _ => panic!("span is not an element"),
        }
    }

    #[test]
    fn test_keep_discards_journal() {
        let (mut tree, [root, fragment, ..]) = sample();

        tree.begin();
        tree.get_mut(root).unwrap().children.retain(|child| *child != fragment);
        tree.remove_subtree(fragment);
        tree.keep();

        assert_eq!(tree.rollback(), 0);
        assert!(!tree.contains(fragment));
        assert_eq!(tree.collect_hosts(root), vec![NodeRef(3)]);
    }

    #[test]
    fn test_nearest_boundary_skips_pending() {
        let mut tree = Tree::new();
        let chain = ContextChain::empty();
        let boundary = |status| {
            FiberKind::Suspense(Boundary {
                fallback: Node::Empty,
                children: Node::Empty,
                status,
                epoch: 0,
            })
        };

        let outer = tree.insert(boundary(BoundaryStatus::Resolved), None, chain.clone(), None);
        let inner = tree.insert(boundary(BoundaryStatus::Pending), Some(outer), chain.clone(), None);
        let leaf = tree.insert(FiberKind::Empty, Some(inner), chain, None);

        assert_eq!(tree.nearest_boundary(leaf), Some(outer));
        assert_eq!(tree.nearest_boundary(inner), Some(outer));
        assert_eq!(tree.nearest_boundary(outer), None);
    }
}
