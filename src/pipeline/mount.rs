//! Mount API - the renderer entry point.
//!
//! A [`Renderer`] owns one document and a single-threaded executor. `render`
//! and `update` run synchronously; state updates and suspense retries are
//! queued on the executor and run when the host drains it with
//! [`Renderer::run_microtasks`], the analogue of awaiting a resolved promise.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::prelude::*;
//!
//! let mut doc = MemoryDocument::new();
//! let target = doc.create_element("div");
//! let renderer = Renderer::new(doc.clone());
//!
//! renderer.render(component(counter, ()), target)?;
//! doc.click(doc.query_selector(target, "button").unwrap());
//! renderer.run_microtasks()?;
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;

use super::runtime::Runtime;
use crate::config::RendererConfig;
use crate::error::RenderError;
use crate::primitives::Node;
use crate::renderer::Document;
use crate::state::InstanceHandle;
use crate::types::NodeRef;

// =============================================================================
// Renderer
// =============================================================================

/// Mounts descriptor trees onto a document and keeps them up to date.
pub struct Renderer {
    runtime: Rc<Runtime>,
    pool: RefCell<LocalPool>,
}

impl Renderer {
    /// Renderer over `document` with the default config.
    pub fn new(document: impl Document + 'static) -> Self {
        Self::with_config(document, RendererConfig::default())
    }

    pub fn with_config(document: impl Document + 'static, config: RendererConfig) -> Self {
        let pool = LocalPool::new();
        let runtime = Runtime::new(Box::new(document), config, pool.spawner());
        Self {
            runtime,
            pool: RefCell::new(pool),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        self.runtime.config()
    }

    /// Mount `node` into `target`.
    ///
    /// Rendering again at the same target diffs against what is mounted
    /// there. Fails without touching the document if any component fails or
    /// suspends outside of a boundary.
    pub fn render(&self, node: impl Into<Node>, target: NodeRef) -> Result<(), RenderError> {
        self.runtime.render(node.into(), target)
    }

    /// Re-run one mounted instance now, bypassing the scheduler.
    ///
    /// A handle to an unmounted instance is ignored.
    pub fn update(&self, instance: &InstanceHandle) -> Result<(), RenderError> {
        self.runtime.update(instance.id())
    }

    /// Remove everything mounted at `target`. Returns false if nothing was.
    pub fn unmount(&self, target: NodeRef) -> Result<bool, RenderError> {
        self.runtime.unmount(target)
    }

    /// True if updates were requested and no flush has run for them yet.
    pub fn has_pending_updates(&self) -> bool {
        self.runtime.has_pending_updates()
    }

    /// Run queued flushes and suspense continuations until none can make
    /// progress.
    ///
    /// Returns the first fatal error raised by that work. Further errors of
    /// the same drain were logged and are dropped.
    pub fn run_microtasks(&self) -> Result<(), RenderError> {
        self.pool
            .try_borrow_mut()
            .map_err(|_| RenderError::Reentrant)?
            .run_until_stalled();

        match self.runtime.take_errors().into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", self.config())
            .field("pending_updates", &self.has_pending_updates())
            .finish()
    }
}
