//! Pipeline - from descriptors to a live document
//!
//! ```text
//! render(node, target) ─┐
//! update(instance) ─────┼─▶ Pass over the fiber tree ─▶ commit ─▶ Document
//! scheduler flush ──────┤                                  │
//! suspense retry ───────┘                                  └─▶ spawn continuations
//! ```
//!
//! - **Mount**: [`Renderer`], the public entry point
//! - **Runtime**: shared state reached by setters and executor tasks

pub mod mount;
mod runtime;

pub use mount::Renderer;
