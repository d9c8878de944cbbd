//! Renderer Module - the document side of the engine
//!
//! - **Document** - the capability trait a host implements
//! - **Commit** - mutations buffered during a pass, applied when it succeeds
//! - **Memory** - an in-memory document for tests and string output

mod commit;
mod document;
mod memory;

pub use commit::CommitQueue;
pub use document::Document;
pub use memory::{MemoryDocument, Mutation};
