//! Engine - the committed fiber tree and everything that changes it.
//!
//! - **Tree**: fiber arena, host-node queries, never-reused ids
//! - **Reconcile**: one render pass diffing descriptors against fibers
//! - **Suspense**: boundaries, fallbacks and retries on settlement
//! - **Scheduler**: pending-update set flushed once per microtask
//!
//! # Architecture
//!
//! ```text
//! Node descriptors ──▶ Pass (ContextStore, collectors) ──▶ CommitQueue ──▶ Document
//!                         │                                   ▲
//!                         ▼                                   │
//!                       Tree ◀── Scheduler flush / suspense retry
//! ```
//!
//! A pass never touches the live document except to create detached nodes.
//! Its mutations are applied by the runtime after the pass returns `Ok`.

mod reconcile;
mod scheduler;
mod suspense;
mod tree;

pub(crate) use reconcile::{Pass, PassOutput};
pub(crate) use scheduler::Scheduler;
pub(crate) use suspense::Suspension;
pub(crate) use tree::{BoundaryStatus, FiberFlags, FiberKind, Tree};
