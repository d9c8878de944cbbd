//! Suspense Coordinator - boundaries, fallbacks and retries.
//!
//! A boundary attempts its children with a fresh suspension collector on the
//! pass. Components that read an unsettled [`Deferred`] push a
//! [`PendingSignal`] into the innermost collector and render nothing; their
//! siblings keep rendering, so one attempt discovers every dependency.
//!
//! When the collector comes back non-empty the attempt is discarded, the
//! fallback is committed in its place and a [`Suspension`] is handed to the
//! runtime, which awaits all dependencies jointly and then calls
//! [`Pass::retry_boundary`].
//!
//! ```text
//!   Resolved ──attempt suspends──▶ Pending ──settled, retry ok──▶ Resolved
//!      ▲                            │   ▲                            │
//!      └────────────────────────────┘   └──retry suspends again──────┘
//! ```
//!
//! A retry re-renders the boundary's children descriptor from scratch under
//! the providers captured at the boundary's own position; providers inside
//! the boundary are part of that descriptor and are replayed with it.
//!
//! [`Deferred`]: crate::state::Deferred

use futures::future::LocalBoxFuture;
use tracing::debug;

use super::reconcile::Pass;
use super::tree::{BoundaryStatus, FiberKind};
use crate::error::{PendingSignal, RenderError};
use crate::state::SettleError;
use crate::types::FiberId;

/// Dependencies a boundary is waiting on after a committed suspension.
pub(crate) struct Suspension {
    pub boundary: FiberId,
    /// Epoch the boundary had when it suspended.
    pub epoch: u64,
    pub dependencies: Vec<LocalBoxFuture<'static, Result<(), SettleError>>>,
}

impl std::fmt::Debug for Suspension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suspension")
            .field("boundary", &self.boundary)
            .field("epoch", &self.epoch)
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

impl Pass<'_> {
    /// Render boundary `id` from its stored descriptors.
    pub(super) fn render_boundary(&mut self, id: FiberId) -> Result<(), RenderError> {
        let (status, children) = match &self.tree.get(id)?.kind {
            FiberKind::Suspense(boundary) => (boundary.status, boundary.children.clone()),
            _ => return Err(RenderError::MissingInstance(id)),
        };

        match status {
            BoundaryStatus::Resolved => {
                self.collectors.push(Vec::new());
                let attempt = self.reconcile_children(id, vec![children]);
                let signals = self.collectors.pop().unwrap_or_default();
                attempt?;

                if signals.is_empty() {
                    return Ok(());
                }
                self.show_fallback(id, signals)
            }

            BoundaryStatus::Pending => {
                // The fallback is what is committed; attempt the children in
                // a fresh subtree next to it.
                let shown = std::mem::take(&mut self.tree.get_mut(id)?.children);

                self.collectors.push(Vec::new());
                let attempt = self.reconcile_children(id, vec![children]);
                let signals = self.collectors.pop().unwrap_or_default();
                attempt?;

                if signals.is_empty() {
                    for fallback in shown {
                        self.unmount(fallback);
                    }
                    self.set_status(id, BoundaryStatus::Resolved)?;
                    debug!(boundary = %id, "suspense resolved");
                    return Ok(());
                }

                let attempted = std::mem::take(&mut self.tree.get_mut(id)?.children);
                for fiber in attempted {
                    self.unmount(fiber);
                }
                self.tree.get_mut(id)?.children = shown;
                self.show_fallback(id, signals)
            }
        }
    }

    /// Replace whatever boundary `id` shows with its fallback and record the
    /// suspension.
    ///
    /// Suspensions raised by the fallback itself go to the next boundary out.
    pub(super) fn show_fallback(
        &mut self,
        id: FiberId,
        signals: Vec<PendingSignal>,
    ) -> Result<(), RenderError> {
        let fiber = self.tree.get_mut(id)?;
        let context = fiber.context.clone();
        let (fallback, previous_status) = match &fiber.kind {
            FiberKind::Suspense(boundary) => (boundary.fallback.clone(), boundary.status),
            _ => return Err(RenderError::MissingInstance(id)),
        };

        if previous_status == BoundaryStatus::Resolved {
            let children = std::mem::take(&mut fiber.children);
            for child in children {
                self.unmount(child);
            }
        }

        let outer = self.store.restore(context);
        let rendered = self.reconcile_children(id, vec![fallback]);
        self.store.restore(outer);
        rendered?;

        let fiber = self.tree.get_mut(id)?;
        let FiberKind::Suspense(boundary) = &mut fiber.kind else {
            return Err(RenderError::MissingInstance(id));
        };
        boundary.status = BoundaryStatus::Pending;
        boundary.epoch += 1;

        debug!(
            boundary = %id,
            epoch = boundary.epoch,
            dependencies = signals.len(),
            components = ?signals.iter().map(PendingSignal::component).collect::<Vec<_>>(),
            "suspended, showing fallback"
        );
        self.suspensions.push(Suspension {
            boundary: id,
            epoch: boundary.epoch,
            dependencies: signals.into_iter().map(|signal| signal.dependency).collect(),
        });
        Ok(())
    }

    /// Re-attempt the children of pending boundary `id` after its
    /// dependencies settled.
    pub fn retry_boundary(&mut self, id: FiberId) -> Result<(), RenderError> {
        let context = self.tree.get(id)?.context.clone();
        self.store.restore(context);
        self.render_boundary(id)?;
        self.place(id)
    }

    fn set_status(&mut self, id: FiberId, status: BoundaryStatus) -> Result<(), RenderError> {
        match &mut self.tree.get_mut(id)?.kind {
            FiberKind::Suspense(boundary) => {
                boundary.status = status;
                Ok(())
            }
            _ => Err(RenderError::MissingInstance(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::{Rc, Weak};

    use super::*;
    use crate::config::RendererConfig;
    use crate::context::ContextChain;
    use crate::engine::tree::Tree;
    use crate::primitives::{Node, Render, component, element, fragment, suspense};
    use crate::renderer::{Document, MemoryDocument};
    use crate::state::{Deferred, Scope, UpdateQueue};
    use crate::types::NodeRef;

    struct NoQueue;

    impl UpdateQueue for NoQueue {
        fn request_update(&self, _: FiberId) {}
    }

    fn shows(cx: &mut Scope<'_>, value: &Deferred<String>) -> Render {
        let text = cx.use_deferred(value)?;
        Ok(element("p").child(text).into())
    }

    fn run(
        tree: &mut Tree,
        doc: &mut MemoryDocument,
        step: impl FnOnce(&mut Pass<'_>) -> Result<(), RenderError>,
    ) -> Vec<Suspension> {
        let config = RendererConfig::default();
        let queue: Weak<dyn UpdateQueue> = Weak::<NoQueue>::new();
        let mut pass = Pass::new(tree, doc, &config, &queue);
        step(&mut pass).unwrap();
        let output = pass.finish();
        output.commit.apply(doc);
        output.suspensions
    }

    fn setup() -> (Tree, MemoryDocument, NodeRef, FiberId) {
        let mut doc = MemoryDocument::new();
        let target = doc.create_element("div");
        let mut tree = Tree::new();
        let root = tree.insert(FiberKind::Root, None, ContextChain::empty(), None);
        tree.get_mut(root).unwrap().host = Some(target);
        (tree, doc, target, root)
    }

    #[test]
    fn test_fallback_then_retry() {
        let (mut tree, mut doc, target, root) = setup();
        let (value, resolver) = Deferred::pending();
        let view = fragment(vec![
            Node::from("a"),
            suspense("loading", component(shows, value.clone())),
            Node::from("z"),
        ]);

        let suspensions = run(&mut tree, &mut doc, |pass| pass.render_root(root, view));
        assert_eq!(doc.inner_html(target), "aloadingz");
        assert_eq!(suspensions.len(), 1);
        assert_eq!(suspensions[0].epoch, 1);

        resolver.resolve("ready".to_string());
        let mut dependencies = suspensions.into_iter().next().unwrap().dependencies;
        futures::executor::block_on(dependencies.remove(0)).unwrap();

        let boundary = suspensions_boundary(&tree, root);
        let again = run(&mut tree, &mut doc, |pass| pass.retry_boundary(boundary));
        assert!(again.is_empty());
        assert_eq!(doc.inner_html(target), "a<p>ready</p>z");
    }

    #[test]
    fn test_siblings_collect_every_dependency() {
        let (mut tree, mut doc, target, root) = setup();
        let (first, _r1) = Deferred::pending();
        let (second, _r2) = Deferred::pending();
        let view = suspense(
            element("i").child("wait"),
            fragment(vec![
                Node::from(component(shows, first)),
                Node::from(component(shows, second)),
            ]),
        );

        let suspensions = run(&mut tree, &mut doc, |pass| pass.render_root(root, view));
        assert_eq!(doc.inner_html(target), "<i>wait</i>");
        assert_eq!(suspensions[0].dependencies.len(), 2);
    }

    #[test]
    fn test_retry_that_suspends_again_keeps_fallback() {
        let (mut tree, mut doc, target, root) = setup();
        let (value, _resolver) = Deferred::<String>::pending();
        let view = suspense("loading", component(shows, value));

        run(&mut tree, &mut doc, |pass| pass.render_root(root, view));
        let fallback_node = doc.children(target)[0];

        let boundary = suspensions_boundary(&tree, root);
        let again = run(&mut tree, &mut doc, |pass| pass.retry_boundary(boundary));
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].epoch, 2);
        assert_eq!(doc.children(target), vec![fallback_node]);
    }

    #[test]
    fn test_failed_retry_keeps_fallback_for_next_retry() {
        fn flaky(cx: &mut Scope<'_>, props: &(Deferred<String>, Rc<Cell<bool>>)) -> Render {
            let text = cx.use_deferred(&props.0)?;
            if props.1.get() {
                return Err(cx.fail("flaky"));
            }
            Ok(element("p").child(text).into())
        }

        let (mut tree, mut doc, target, root) = setup();
        let (value, resolver) = Deferred::pending();
        let failing = Rc::new(Cell::new(true));
        let view = suspense("loading", component(flaky, (value, failing.clone())));

        let suspensions = run(&mut tree, &mut doc, |pass| pass.render_root(root, view));
        resolver.resolve("ready".to_string());
        let mut dependencies = suspensions.into_iter().next().unwrap().dependencies;
        futures::executor::block_on(dependencies.remove(0)).unwrap();

        let boundary = suspensions_boundary(&tree, root);
        {
            let config = RendererConfig::default();
            let queue: Weak<dyn UpdateQueue> = Weak::<NoQueue>::new();
            let mut pass = Pass::new(&mut tree, &mut doc, &config, &queue);
            assert!(pass.retry_boundary(boundary).is_err());
            pass.abort();
        }
        assert_eq!(doc.inner_html(target), "loading");

        failing.set(false);
        let again = run(&mut tree, &mut doc, |pass| pass.retry_boundary(boundary));
        assert!(again.is_empty());
        assert_eq!(doc.inner_html(target), "<p>ready</p>");
        assert_eq!(doc.children(target).len(), 1);
    }

    fn suspensions_boundary(tree: &Tree, root: FiberId) -> FiberId {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let fiber = tree.get(id).unwrap();
            if matches!(fiber.kind, FiberKind::Suspense(_)) {
                return id;
            }
            stack.extend(fiber.children.iter().copied());
        }
        panic!("no boundary under root");
    }
}
