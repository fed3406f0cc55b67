//! The core session engine.
//!
//! Everything interactive lives here: the version tree of document
//! revisions, content-anchored annotations, the knowledge collection, and
//! staleness tracking for the consolidated view. The engine is synchronous
//! and single-writer; external generation calls and HTTP plumbing sit
//! outside it.

mod anchor;
mod collection;
mod session;
mod signature;
mod tree;

pub use anchor::{resolve, ResolvedSpan};
pub use collection::CollectionStore;
pub use session::{Consolidation, SessionEngine, SessionSnapshot, ROOT_TITLE};
pub use signature::{compute_signature, is_stale};
pub use tree::{ChildOutcome, DeleteOutcome, VersionTree};

use thiserror::Error;

use crate::models::NodeId;

/// Engine failures. All are rejected synchronously with no state mutated.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Empty/whitespace text, or text that does not occur in the source
    /// document, or a reference to something that does not exist.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation is structurally forbidden (e.g. deleting the root).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}
