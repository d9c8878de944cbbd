//! # spark-dom
//!
//! Incremental component renderer with context, hooks and suspense.
//!
//! A tree of [`Node`] descriptors is mounted onto a [`Document`]. Components
//! are plain functions of a [`Scope`] and their props; they declare state
//! with [`Scope::use_state`], read values published by ancestor providers
//! with [`Scope::use_context`], and read asynchronous values with
//! [`Scope::use_deferred`], which suspends the nearest [`suspense`] boundary
//! until the value settles.
//!
//! ## Architecture
//!
//! ```text
//! descriptors ─▶ engine (fiber tree, reconcile pass, suspense) ─▶ commit queue ─▶ Document
//!                    ▲
//!   Setter::set ─▶ scheduler ─▶ microtask flush
//! ```
//!
//! Rendering is single threaded. State updates and suspense retries run on
//! the renderer's executor, drained by [`Renderer::run_microtasks`].
//!
//! ## Modules
//!
//! - [`primitives`] - node descriptors and builders
//! - [`context`] - context definitions and the provider chain
//! - [`state`] - hooks, setters, deferred values
//! - [`pipeline`] - the [`Renderer`] entry point
//! - [`renderer`] - the [`Document`] trait and [`MemoryDocument`]
//! - [`config`], [`error`], [`logging`] - ambient concerns
//!
//! ## Example
//!
//! ```ignore
//! use spark_dom::prelude::*;
//!
//! fn counter(cx: &mut Scope<'_>, _: &()) -> Render {
//!     let (count, set_count) = cx.use_state(|| 0)?;
//!     Ok(element("button")
//!         .on("click", move |_| set_count.update(|n| n + 1))
//!         .child(count.to_string())
//!         .into())
//! }
//!
//! let mut doc = MemoryDocument::new();
//! let target = doc.create_element("div");
//! let renderer = Renderer::new(doc.clone());
//! renderer.render(component(counter, ()), target)?;
//! ```

pub mod config;
pub mod context;
mod engine;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod primitives;
pub mod renderer;
pub mod state;
pub mod types;

pub use config::{RendererConfig, UpdatePolicy};
pub use context::{Context, ContextStore, create_context};
pub use error::{Interrupt, PendingSignal, RenderError};
pub use pipeline::Renderer;
pub use primitives::{
    Element, Event, Listener, Node, Render, component, element, fragment, suspense, text,
};
pub use renderer::{Document, MemoryDocument, Mutation};
pub use state::{Deferred, InstanceHandle, Resolver, Scope, SettleError, Setter};
pub use types::{FiberId, Key, NodeRef};

/// Everything needed to write and mount components.
pub mod prelude {
    pub use crate::{
        Context, Deferred, Document, Element, Event, InstanceHandle, MemoryDocument, Node,
        Render, RenderError, Renderer, RendererConfig, Scope, Setter, component,
        create_context, element, fragment, suspense, text,
    };
}
