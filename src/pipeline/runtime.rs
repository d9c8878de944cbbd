//! Runtime - shared state behind a [`Renderer`](super::Renderer).
//!
//! The runtime owns the fiber tree, the document, the scheduler and the
//! config. It is reference counted so tasks on the executor (flushes and
//! suspense continuations) can hold it weakly: a task whose renderer was
//! dropped finds nothing to upgrade and ends quietly.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::executor::LocalSpawner;
use futures::future::try_join_all;
use tracing::{debug, debug_span, error, trace};

use crate::config::RendererConfig;
use crate::context::ContextChain;
use crate::engine::{BoundaryStatus, FiberFlags, FiberKind, Pass, PassOutput, Scheduler, Suspension, Tree};
use crate::error::RenderError;
use crate::primitives::Node;
use crate::renderer::Document;
use crate::state::{SettleError, UpdateQueue};
use crate::types::{FiberId, NodeRef};

pub(crate) struct Runtime {
    this: Weak<Runtime>,
    /// `this` as the queue setters and instance handles report to.
    queue: Weak<dyn UpdateQueue>,
    tree: RefCell<Tree>,
    document: RefCell<Box<dyn Document>>,
    scheduler: Scheduler,
    config: RendererConfig,
    /// Fatal errors raised by executor tasks, drained by `run_microtasks`.
    errors: RefCell<Vec<RenderError>>,
}

impl UpdateQueue for Runtime {
    fn request_update(&self, instance: FiberId) {
        if !self.scheduler.enqueue(instance) {
            return;
        }
        let runtime = self.this.clone();
        self.scheduler.spawn(async move {
            if let Some(runtime) = runtime.upgrade() {
                if let Err(error) = runtime.flush() {
                    runtime.report(error);
                }
            }
        });
    }
}

impl Runtime {
    pub fn new(document: Box<dyn Document>, config: RendererConfig, spawner: LocalSpawner) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Runtime>| {
            let queue: Weak<dyn UpdateQueue> = this.clone();
            Runtime {
                this: this.clone(),
                queue,
                tree: RefCell::new(Tree::new()),
                document: RefCell::new(document),
                scheduler: Scheduler::new(spawner),
                config,
                errors: RefCell::new(Vec::new()),
            }
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn has_pending_updates(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn take_errors(&self) -> Vec<RenderError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    fn report(&self, error: RenderError) {
        error!(%error, "render task failed");
        self.errors.borrow_mut().push(error);
    }

    // -------------------------------------------------------------------------
    // Passes
    // -------------------------------------------------------------------------

    /// Run `step` as one pass and commit it if it succeeds. A failed pass is
    /// aborted, leaving tree and document as they were.
    fn run_pass(
        &self,
        step: impl FnOnce(&mut Pass<'_>) -> Result<(), RenderError>,
    ) -> Result<(), RenderError> {
        let mut tree = self.tree.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;
        let mut document = self.document.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;

        let output = {
            let mut pass = Pass::new(&mut tree, &mut **document, &self.config, &self.queue);
            if let Err(error) = step(&mut pass) {
                pass.abort();
                return Err(error);
            }
            pass.finish()
        };
        self.commit(output, &mut **document);
        Ok(())
    }

    fn commit(&self, output: PassOutput, document: &mut dyn Document) {
        let PassOutput { commit, suspensions } = output;
        let mutations = commit.apply(document);
        trace!(mutations, suspensions = suspensions.len(), "pass committed");

        for suspension in suspensions {
            self.watch(suspension);
        }
    }

    /// Mount `node` at `target`, or re-render the root already there.
    pub fn render(&self, node: Node, target: NodeRef) -> Result<(), RenderError> {
        let _span = debug_span!("render", %target).entered();

        let (root, fresh) = {
            let mut tree = self.tree.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;
            match tree.root_at(target) {
                Some(root) => (root, false),
                None => {
                    let root = tree.insert(FiberKind::Root, None, ContextChain::empty(), None);
                    tree.get_mut(root)?.host = Some(target);
                    tree.add_root(target, root);
                    (root, true)
                }
            }
        };

        let result = self.run_pass(|pass| pass.render_root(root, node));
        if result.is_err() && fresh {
            // Nothing was attached; forget the root so a later render starts over.
            if let Ok(mut tree) = self.tree.try_borrow_mut() {
                tree.remove_subtree(root);
                tree.remove_root(target);
            }
        }
        result
    }

    /// Re-run one instance in place. Stale ids are ignored.
    pub fn update(&self, instance: FiberId) -> Result<(), RenderError> {
        let live = self
            .tree
            .try_borrow()
            .map_err(|_| RenderError::Reentrant)?
            .contains(instance);
        if !live {
            trace!(%instance, "update for unmounted instance dropped");
            return Ok(());
        }

        let _span = debug_span!("update", %instance).entered();
        self.run_pass(|pass| pass.rerender(instance))
    }

    /// Tear down the root mounted at `target`. Returns false if there is none.
    pub fn unmount(&self, target: NodeRef) -> Result<bool, RenderError> {
        let root = self
            .tree
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?
            .remove_root(target);
        let Some(root) = root else {
            return Ok(false);
        };

        debug!(%target, "unmounting root");
        self.run_pass(|pass| pass.unmount_root(root))?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Re-render every instance requested since the last flush, shallowest
    /// first. An instance already re-rendered by an ancestor is skipped.
    fn flush(&self) -> Result<(), RenderError> {
        let requested = self.scheduler.take();
        let _span = debug_span!("flush", requested = requested.len()).entered();

        let mut batch = Vec::with_capacity(requested.len());
        {
            let mut tree = self.tree.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;
            for id in requested {
                match tree.get_mut(id) {
                    Ok(fiber) => {
                        fiber.flags.insert(FiberFlags::DIRTY);
                        batch.push((fiber.depth, id));
                    }
                    Err(_) => trace!(instance = %id, "update for unmounted instance dropped"),
                }
            }
        }
        batch.sort_unstable();

        let mut outcome = Ok(());
        for (_, id) in batch {
            let dirty = {
                let mut tree = self.tree.try_borrow_mut().map_err(|_| RenderError::Reentrant)?;
                match tree.get_mut(id) {
                    Ok(fiber) if outcome.is_err() => {
                        fiber.flags.remove(FiberFlags::DIRTY);
                        false
                    }
                    Ok(fiber) => fiber.flags.contains(FiberFlags::DIRTY),
                    Err(_) => false,
                }
            };
            if !dirty {
                continue;
            }
            if let Err(error) = self.update(id) {
                // The aborted pass restored the flag along with the fiber.
                if let Ok(mut tree) = self.tree.try_borrow_mut() {
                    if let Ok(fiber) = tree.get_mut(id) {
                        fiber.flags.remove(FiberFlags::DIRTY);
                    }
                }
                outcome = Err(error);
            }
        }
        outcome
    }

    // -------------------------------------------------------------------------
    // Suspense Continuations
    // -------------------------------------------------------------------------

    /// Await every dependency of `suspension`, then settle its boundary.
    fn watch(&self, suspension: Suspension) {
        let Suspension {
            boundary,
            epoch,
            dependencies,
        } = suspension;
        let runtime = self.this.clone();

        self.scheduler.spawn(async move {
            let outcome = try_join_all(dependencies).await.map(|_| ());
            if let Some(runtime) = runtime.upgrade() {
                if let Err(error) = runtime.settle(boundary, epoch, outcome) {
                    runtime.report(error);
                }
            }
        });
    }

    fn settle(
        &self,
        boundary: FiberId,
        epoch: u64,
        outcome: Result<(), SettleError>,
    ) -> Result<(), RenderError> {
        let waiting = {
            let tree = self.tree.try_borrow().map_err(|_| RenderError::Reentrant)?;
            match tree.get(boundary).map(|fiber| &fiber.kind) {
                Ok(FiberKind::Suspense(state)) => {
                    state.status == BoundaryStatus::Pending && state.epoch == epoch
                }
                _ => false,
            }
        };
        if !waiting {
            trace!(%boundary, epoch, "settlement for outdated boundary ignored");
            return Ok(());
        }

        outcome?;
        let _span = debug_span!("retry", %boundary, epoch).entered();
        debug!("dependencies settled, retrying boundary");
        self.run_pass(|pass| pass.retry_boundary(boundary))
    }
}
