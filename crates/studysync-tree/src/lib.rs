//! Path-addressed analysis tree for studysync.
//!
//! The reconciliation layer treats the move tree as an external collaborator
//! and talks to it only through [`TreeStore`]: existence checks and edits at
//! a [`Path`](studysync_types::Path). [`AnalysisTree`] is the in-memory
//! implementation used by clients and tests.
//!
//! # Tree Model
//!
//! - Each node owns its children; `children[0]` is the mainline.
//! - A path is the concatenation of node ids from the root.
//! - Node ids are assigned by the server and are unique among siblings.

mod error;
mod store;
mod tree;

pub use error::TreeError;
pub use store::TreeStore;
pub use tree::AnalysisTree;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
