//! Reconcile Pass - diff descriptors against committed fibers.
//!
//! A [`Pass`] walks descriptors top-down next to the fiber tree. For every
//! child list it matches new descriptors to existing fibers (by key when one
//! is given, otherwise by position), updates what matched with the same
//! type, unmounts what did not, and mounts the rest.
//!
//! Document nodes are created as soon as a fiber needs one; they stay
//! detached and invisible until the pass commits. Every other mutation goes
//! to the pass's [`CommitQueue`].
//!
//! A pass either finishes or aborts. Aborting rolls the fiber tree back to
//! its committed state and releases the detached nodes the pass created, so
//! tree and document agree again.
//!
//! The provider chain is threaded through the pass as an explicit
//! [`ContextStore`]; every fiber records the chain in effect at its position
//! so a later `update` of that fiber starts from the same providers.

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::suspense::Suspension;
use super::tree::{
    Boundary, BoundaryStatus, ComponentFiber, FiberFlags, FiberKind, ListenerTable, Tree,
};
use crate::config::RendererConfig;
use crate::context::{ContextId, ContextStore};
use crate::error::{Interrupt, PendingSignal, RenderError};
use crate::primitives::{Event, Listener, Node};
use crate::renderer::{CommitQueue, Document};
use crate::state::{Scope, UpdateQueue};
use crate::types::{FiberId, Key, NodeRef};

// =============================================================================
// Pass
// =============================================================================

/// One render pass over the fiber tree.
pub(crate) struct Pass<'a> {
    pub(super) tree: &'a mut Tree,
    pub(super) document: &'a mut dyn Document,
    pub(super) store: ContextStore,
    pub(super) commit: CommitQueue,
    /// Suspension collectors, one per boundary whose children are being
    /// attempted, innermost last.
    pub(super) collectors: Vec<Vec<PendingSignal>>,
    pub(super) suspensions: Vec<Suspension>,
    /// Detached nodes created by this pass, released if it aborts.
    created: Vec<NodeRef>,
    config: &'a RendererConfig,
    queue: &'a Weak<dyn UpdateQueue>,
}

/// What a successful pass leaves behind for the runtime to commit.
pub(crate) struct PassOutput {
    pub commit: CommitQueue,
    pub suspensions: Vec<Suspension>,
}

impl<'a> Pass<'a> {
    pub fn new(
        tree: &'a mut Tree,
        document: &'a mut dyn Document,
        config: &'a RendererConfig,
        queue: &'a Weak<dyn UpdateQueue>,
    ) -> Self {
        tree.begin();
        Self {
            tree,
            document,
            store: ContextStore::new(),
            commit: CommitQueue::new(),
            collectors: Vec::new(),
            suspensions: Vec::new(),
            created: Vec::new(),
            config,
            queue,
        }
    }

    /// Keep the pass's changes to the tree and hand over its mutations.
    pub fn finish(self) -> PassOutput {
        self.tree.keep();
        PassOutput {
            commit: self.commit,
            suspensions: self.suspensions,
        }
    }

    /// Discard the pass: restore the committed tree and release every node
    /// it created. Its queued mutations are dropped unapplied.
    pub fn abort(self) {
        let restored = self.tree.rollback();
        for node in &self.created {
            self.document.release(*node);
        }
        debug!(restored, released = self.created.len(), "pass aborted");
    }

    // -------------------------------------------------------------------------
    // Entry Points
    // -------------------------------------------------------------------------

    /// Render `node` as the only child of the root fiber `root`.
    pub fn render_root(&mut self, root: FiberId, node: Node) -> Result<(), RenderError> {
        self.store.restore(self.tree.get(root)?.context.clone());
        self.reconcile_children(root, vec![node])
    }

    /// Re-run one component instance under the providers captured at its
    /// position.
    ///
    /// A suspension is caught by the nearest boundary above the instance,
    /// which then shows its fallback.
    pub fn rerender(&mut self, id: FiberId) -> Result<(), RenderError> {
        self.store.restore(self.tree.get(id)?.context.clone());

        let boundary = self.tree.nearest_boundary(id);
        if boundary.is_some() {
            self.collectors.push(Vec::new());
        }
        self.render_component(id)?;

        if let Some(boundary) = boundary {
            let signals = self.collectors.pop().unwrap_or_default();
            if !signals.is_empty() {
                self.show_fallback(boundary, signals)?;
                return self.place(boundary);
            }
        }
        self.place(id)
    }

    /// Tear down every fiber under `root`, detaching its document output.
    pub fn unmount_root(&mut self, root: FiberId) -> Result<(), RenderError> {
        let children = std::mem::take(&mut self.tree.get_mut(root)?.children);
        for child in children {
            self.unmount(child);
        }
        self.tree.remove_subtree(root);
        Ok(())
    }

    /// Queue the placement of everything `target` produces at its position
    /// inside its host parent.
    pub(super) fn place(&mut self, target: FiberId) -> Result<(), RenderError> {
        let Some(parent) = self.tree.host_parent(target) else {
            return Ok(());
        };
        let hosts = self.tree.collect_hosts(target);
        let anchor = self.tree.next_host_after(target);
        self.commit.place(parent, hosts, anchor);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Child Lists
    // -------------------------------------------------------------------------

    /// Make the children of `parent` match `nodes`.
    pub(super) fn reconcile_children(
        &mut self,
        parent: FiberId,
        nodes: Vec<Node>,
    ) -> Result<(), RenderError> {
        let old = std::mem::take(&mut self.tree.get_mut(parent)?.children);

        let mut keyed: HashMap<Key, FiberId> = HashMap::new();
        let mut positional: VecDeque<FiberId> = VecDeque::new();
        for id in old {
            match self.tree.get(id)?.key.clone() {
                Some(key) => {
                    if let Some(duplicate) = keyed.insert(key, id) {
                        positional.push_back(duplicate);
                    }
                }
                None => positional.push_back(id),
            }
        }

        let mut children = Vec::with_capacity(nodes.len());
        for node in nodes {
            let candidate = match node.key() {
                Some(key) => keyed.remove(key),
                None => positional.pop_front(),
            };

            let child = match candidate {
                Some(existing) if self.same_type(existing, &node)? => {
                    self.update_fiber(existing, node)?;
                    existing
                }
                other => {
                    if let Some(stale) = other {
                        self.unmount(stale);
                    }
                    self.mount(parent, node)?
                }
            };
            children.push(child);
            self.tree.get_mut(parent)?.children.push(child);
        }

        for stale in keyed.into_values().chain(positional) {
            self.unmount(stale);
        }

        let fiber = self.tree.get(parent)?;
        if matches!(fiber.kind, FiberKind::Root | FiberKind::Element { .. }) {
            if let Some(host) = fiber.host {
                let hosts: Vec<_> = children
                    .iter()
                    .flat_map(|child| self.tree.collect_hosts(*child))
                    .collect();
                self.commit.place(host, hosts, None);
            }
        }
        Ok(())
    }

    fn same_type(&self, id: FiberId, node: &Node) -> Result<bool, RenderError> {
        let fiber = self.tree.get(id)?;
        Ok(match (&fiber.kind, node) {
            (FiberKind::Element { tag, .. }, Node::Element(element)) => *tag == element.tag,
            (FiberKind::Text(_), Node::Text(_)) => true,
            (FiberKind::Fragment, Node::Fragment(_)) => true,
            (FiberKind::Empty, Node::Empty) => true,
            (FiberKind::Component(component), Node::Component(next)) => component.id == next.id,
            (FiberKind::Provider { context, .. }, Node::Provider(next)) => *context == next.context,
            (FiberKind::Suspense(_), Node::Suspense(_)) => true,
            _ => false,
        })
    }

    // -------------------------------------------------------------------------
    // Mount
    // -------------------------------------------------------------------------

    fn mount(&mut self, parent: FiberId, node: Node) -> Result<FiberId, RenderError> {
        let context = self.store.snapshot();
        let key = node.key().cloned();

        match node {
            Node::Empty => Ok(self.tree.insert(FiberKind::Empty, Some(parent), context, key)),

            Node::Text(text) => {
                let host = self.document.create_text(&text);
                self.created.push(host);
                let id = self.tree.insert(FiberKind::Text(text), Some(parent), context, key);
                self.tree.get_mut(id)?.host = Some(host);
                Ok(id)
            }

            Node::Element(element) => {
                let host = self.document.create_element(&element.tag);
                self.created.push(host);
                for (name, value) in &element.attributes {
                    self.commit.set_attribute(host, name, value);
                }

                let listeners = ListenerTable::default();
                for (event, listener) in element.listeners {
                    self.commit.add_listener(host, &event, listener_proxy(&listeners, &event));
                    listeners.borrow_mut().insert(event, listener);
                }

                let kind = FiberKind::Element {
                    tag: element.tag,
                    attributes: element.attributes,
                    listeners,
                };
                let id = self.tree.insert(kind, Some(parent), context, key);
                self.tree.get_mut(id)?.host = Some(host);
                self.reconcile_children(id, element.children)?;
                Ok(id)
            }

            Node::Fragment(children) => {
                let id = self.tree.insert(FiberKind::Fragment, Some(parent), context, key);
                self.reconcile_children(id, children)?;
                Ok(id)
            }

            Node::Component(component) => {
                let kind = FiberKind::Component(ComponentFiber {
                    id: component.id,
                    name: component.name,
                    render: component.render,
                    hooks: Vec::new(),
                });
                let id = self.tree.insert(kind, Some(parent), context, key);
                self.render_component(id)?;
                Ok(id)
            }

            Node::Provider(provider) => {
                let kind = FiberKind::Provider {
                    context: provider.context,
                    value: provider.value.clone(),
                };
                let id = self.tree.insert(kind, Some(parent), context, key);
                self.provide(id, provider.context, provider.value, provider.children)?;
                Ok(id)
            }

            Node::Suspense(suspense) => {
                let kind = FiberKind::Suspense(Boundary {
                    fallback: *suspense.fallback,
                    children: *suspense.children,
                    status: BoundaryStatus::Resolved,
                    epoch: 0,
                });
                let id = self.tree.insert(kind, Some(parent), context, key);
                self.render_boundary(id)?;
                Ok(id)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    fn update_fiber(&mut self, id: FiberId, node: Node) -> Result<(), RenderError> {
        let context = self.store.snapshot();
        let fiber = self.tree.get_mut(id)?;
        fiber.context = context;
        let host = fiber.host;

        match (&mut fiber.kind, node) {
            (FiberKind::Text(current), Node::Text(text)) => {
                if *current != text {
                    if let Some(host) = host {
                        self.commit.set_text(host, &text);
                    }
                    *current = text;
                }
                Ok(())
            }

            (
                FiberKind::Element {
                    attributes,
                    listeners,
                    ..
                },
                Node::Element(element),
            ) => {
                if let Some(host) = host {
                    diff_attributes(&mut self.commit, host, attributes, &element.attributes);
                    diff_listeners(&mut self.commit, host, listeners, element.listeners);
                }
                *attributes = element.attributes;
                self.reconcile_children(id, element.children)
            }

            (FiberKind::Fragment, Node::Fragment(children)) => self.reconcile_children(id, children),

            (FiberKind::Empty, Node::Empty) => Ok(()),

            (FiberKind::Component(current), Node::Component(component)) => {
                current.render = component.render;
                current.name = component.name;
                self.render_component(id)
            }

            (FiberKind::Provider { value, .. }, Node::Provider(provider)) => {
                *value = provider.value.clone();
                self.provide(id, provider.context, provider.value, provider.children)
            }

            (FiberKind::Suspense(boundary), Node::Suspense(suspense)) => {
                boundary.fallback = *suspense.fallback;
                boundary.children = *suspense.children;
                self.render_boundary(id)
            }

            _ => Err(RenderError::MissingInstance(id)),
        }
    }

    /// Reconcile `children` of provider `id` with `value` pushed.
    fn provide(
        &mut self,
        id: FiberId,
        context: ContextId,
        value: Rc<dyn Any>,
        children: Vec<Node>,
    ) -> Result<(), RenderError> {
        let frame = self.store.push_provider(context, value);
        let result = self.reconcile_children(id, children);
        self.store.pop(frame)?;
        result
    }

    // -------------------------------------------------------------------------
    // Components
    // -------------------------------------------------------------------------

    /// Run the body of component `id` and reconcile what it returned.
    pub(super) fn render_component(&mut self, id: FiberId) -> Result<(), RenderError> {
        let fiber = self.tree.get_mut(id)?;
        let completed = fiber.flags.contains(FiberFlags::COMPLETED);
        let FiberKind::Component(component) = &mut fiber.kind else {
            return Err(RenderError::MissingInstance(id));
        };
        let render = component.render.clone();
        let name = component.name;
        let mut hooks = std::mem::take(&mut component.hooks);

        trace!(component = name, instance = %id, "render");
        let (outcome, read) = {
            let mut scope = Scope::new(
                id,
                name,
                &mut hooks,
                completed,
                self.config,
                &self.store,
                self.queue,
            );
            let outcome = render(&mut scope);
            (outcome, scope.slots_read())
        };
        let declared = hooks.len();

        let fiber = self.tree.get_mut(id)?;
        if let FiberKind::Component(component) = &mut fiber.kind {
            component.hooks = hooks;
        }
        fiber.flags.remove(FiberFlags::DIRTY);

        match outcome {
            Ok(node) => {
                if completed && read != declared {
                    if self.config.strict_hooks {
                        return Err(RenderError::HookCount {
                            component: name,
                            expected: declared,
                            found: read,
                        });
                    }
                    warn!(
                        component = name,
                        expected = declared,
                        found = read,
                        "hook count changed between renders"
                    );
                }
                self.tree.get_mut(id)?.flags.insert(FiberFlags::COMPLETED);
                self.reconcile_children(id, vec![node])
            }
            Err(Interrupt::Suspend(signal)) => {
                trace!(component = name, instance = %id, "suspended");
                match self.collectors.last_mut() {
                    Some(collector) => collector.push(signal),
                    None => {
                        return Err(RenderError::UnhandledSuspend {
                            component: signal.component,
                        });
                    }
                }
                self.reconcile_children(id, Vec::new())
            }
            Err(Interrupt::Fail(error)) => Err(error),
        }
    }

    // -------------------------------------------------------------------------
    // Unmount
    // -------------------------------------------------------------------------

    /// Destroy `id` and its subtree, queueing removal of its top-level nodes.
    pub(super) fn unmount(&mut self, id: FiberId) {
        for host in self.tree.collect_hosts(id) {
            self.commit.detach(host);
        }
        let removed = self.tree.remove_subtree(id);
        trace!(fiber = %id, removed, "unmounted");
    }
}

// =============================================================================
// Attribute and Listener Diff
// =============================================================================

fn diff_attributes(
    commit: &mut CommitQueue,
    host: NodeRef,
    old: &[(String, String)],
    new: &[(String, String)],
) {
    for (name, _) in old {
        if !new.iter().any(|(next, _)| next == name) {
            commit.remove_attribute(host, name);
        }
    }
    for (name, value) in new {
        let unchanged = old
            .iter()
            .any(|(previous, current)| previous == name && current == value);
        if !unchanged {
            commit.set_attribute(host, name, value);
        }
    }
}

/// Swap handlers behind the existing proxies; only events that appear or
/// disappear touch the document.
fn diff_listeners(
    commit: &mut CommitQueue,
    host: NodeRef,
    table: &ListenerTable,
    next: Vec<(String, Listener)>,
) {
    let mut current = table.borrow_mut();

    let removed: Vec<String> = current
        .keys()
        .filter(|event| !next.iter().any(|(name, _)| name == *event))
        .cloned()
        .collect();
    for event in removed {
        current.remove(&event);
        commit.remove_listener(host, &event);
    }

    for (event, listener) in next {
        if !current.contains_key(&event) {
            commit.add_listener(host, &event, listener_proxy(table, &event));
        }
        current.insert(event, listener);
    }
}

/// Stable document listener that forwards to whatever handler the element's
/// table holds when the event fires.
fn listener_proxy(table: &ListenerTable, event: &str) -> Listener {
    let table = Rc::downgrade(table);
    let name = event.to_string();
    Rc::new(move |event: &Event| {
        let Some(table) = table.upgrade() else {
            return;
        };
        let handler = table.borrow().get(&name).cloned();
        if let Some(handler) = handler {
            handler(event);
        }
    })
}
