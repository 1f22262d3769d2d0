//! The path-addressed mutation contract the reconciliation layer relies on.
//!
//! The client never reaches into a tree's structure; it only asks whether a
//! path exists and applies server-confirmed edits at a path. Any store that
//! honours this trait can back a study session.

use studysync_types::{Comment, Glyph, Node, Opening, Path, Shape};

use crate::Result;

pub trait TreeStore {
    /// Whether a node lives at `path`.
    fn path_exists(&self, path: &Path) -> bool;

    /// Insert `node` as a child of the node at `path`.
    ///
    /// Returns the new node's path, or `None` when the parent is missing.
    /// Inserting a child whose id already exists is idempotent and returns
    /// the existing child's path.
    fn add_node(&mut self, node: Node, path: &Path) -> Option<Path>;

    /// Attach legal destinations and opening info to the node at `path`.
    fn add_dests(&mut self, dests: Option<String>, path: &Path, opening: Option<Opening>);

    /// Remove the subtree rooted at `path`.
    fn delete_node_at(&mut self, path: &Path) -> Result<()>;

    /// Move the variation ending at `path` up: one step, or all the way to the
    /// mainline when `to_mainline` is set.
    fn promote_at(&mut self, path: &Path, to_mainline: bool) -> Result<()>;

    fn set_shapes_at(&mut self, shapes: Vec<Shape>, path: &Path) -> Result<()>;

    /// Insert or replace (by comment id) a comment.
    fn set_comment_at(&mut self, comment: Comment, path: &Path) -> Result<()>;

    fn delete_comment_at(&mut self, comment_id: &str, path: &Path) -> Result<()>;

    fn set_glyphs_at(&mut self, glyphs: Vec<Glyph>, path: &Path) -> Result<()>;

    /// Ply of the deepest node on `path` that is still on the mainline.
    fn last_mainline_ply(&self, path: &Path) -> u32;

    /// The longest prefix of `path` that still exists.
    fn longest_valid_path(&self, path: &Path) -> Path;
}
