//! State Module - per-instance state and asynchronous dependencies
//!
//! - **Hooks** - [`Scope`], state slots and their [`Setter`]s, instance handles
//! - **Deferred** - [`Deferred`] values read by components under suspense

mod deferred;
mod hooks;

pub use deferred::*;
pub use hooks::{InstanceHandle, Scope, Setter};

pub(crate) use hooks::{HookSlot, UpdateQueue};
