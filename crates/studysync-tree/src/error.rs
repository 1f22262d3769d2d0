//! Error types for tree operations.

use studysync_types::Path;
use thiserror::Error;

/// Errors that can occur when mutating an analysis tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// No node lives at this path.
    #[error("path not found: {0:?}")]
    PathNotFound(Path),

    /// The root is the chapter's starting position and can't be removed.
    #[error("cannot delete the root node")]
    CannotDeleteRoot,

    /// No comment with this id on the node.
    #[error("comment {id} not found at {path:?}")]
    CommentNotFound { id: String, path: Path },
}
