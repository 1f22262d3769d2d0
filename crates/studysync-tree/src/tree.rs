//! In-memory analysis tree.
//!
//! Nodes own their children directly; the first child is the mainline
//! continuation and the rest are variations in display order. Paths are
//! resolved by matching child ids as a prefix of the remaining path, so ids
//! of any length work as long as they're unique among siblings. When one
//! sibling's id prefixes another's, the longer id wins.

use studysync_types::{Comment, Glyph, Node, Opening, Path, Shape};
use tracing::trace;

use crate::{Result, TreeError, TreeStore};

/// Index of the child with the longest id prefixing `rest`.
fn child_index(children: &[Node], rest: &str) -> Option<usize> {
    children
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.id.is_empty() && rest.starts_with(c.id.as_str()))
        .max_by_key(|(_, c)| c.id.len())
        .map(|(i, _)| i)
}

/// A chapter's move tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTree {
    root: Node,
}

impl Default for AnalysisTree {
    fn default() -> Self {
        Self::new(Node::new("", 0))
    }
}

impl From<Node> for AnalysisTree {
    fn from(root: Node) -> Self {
        Self::new(root)
    }
}

impl AnalysisTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Total node count, root included.
    pub fn node_count(&self) -> usize {
        fn count(n: &Node) -> usize {
            1 + n.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    /// Nodes from the root down to `path`, or `None` if any step is missing.
    pub fn node_list(&self, path: &Path) -> Option<Vec<&Node>> {
        let mut nodes = vec![&self.root];
        let mut node = &self.root;
        let mut rest = path.as_str();
        while !rest.is_empty() {
            let idx = child_index(&node.children, rest)?;
            node = &node.children[idx];
            rest = &rest[node.id.len()..];
            nodes.push(node);
        }
        Some(nodes)
    }

    pub fn node_at(&self, path: &Path) -> Option<&Node> {
        self.node_list(path).and_then(|nodes| nodes.last().copied())
    }

    fn node_at_mut(&mut self, path: &Path) -> Option<&mut Node> {
        let mut node = &mut self.root;
        let mut rest = path.as_str();
        while !rest.is_empty() {
            let idx = child_index(&node.children, rest)?;
            let len = node.children[idx].id.len();
            rest = &rest[len..];
            node = &mut node.children[idx];
        }
        Some(node)
    }

    /// Child indices walked to reach `path`.
    fn indices(&self, path: &Path) -> Option<Vec<usize>> {
        let mut out = Vec::new();
        let mut node = &self.root;
        let mut rest = path.as_str();
        while !rest.is_empty() {
            let idx = child_index(&node.children, rest)?;
            node = &node.children[idx];
            rest = &rest[node.id.len()..];
            out.push(idx);
        }
        Some(out)
    }

    fn node_by_indices_mut(&mut self, indices: &[usize]) -> &mut Node {
        let mut node = &mut self.root;
        for &i in indices {
            node = &mut node.children[i];
        }
        node
    }

    fn require_mut(&mut self, path: &Path) -> Result<&mut Node> {
        self.node_at_mut(path)
            .ok_or_else(|| TreeError::PathNotFound(path.clone()))
    }
}

impl TreeStore for AnalysisTree {
    fn path_exists(&self, path: &Path) -> bool {
        self.indices(path).is_some()
    }

    fn add_node(&mut self, node: Node, path: &Path) -> Option<Path> {
        let parent = self.node_at_mut(path)?;
        let new_path = path.child(&node.id);
        if let Some(existing) = parent.children.iter_mut().find(|c| c.id == node.id) {
            trace!(path = %new_path, "node already present, merging dests");
            if existing.dests.is_none() {
                existing.dests = node.dests;
            }
            return Some(new_path);
        }
        parent.children.push(node);
        Some(new_path)
    }

    fn add_dests(&mut self, dests: Option<String>, path: &Path, opening: Option<Opening>) {
        if let Some(node) = self.node_at_mut(path) {
            if dests.is_some() {
                node.dests = dests;
            }
            if opening.is_some() {
                node.opening = opening;
            }
        }
    }

    fn delete_node_at(&mut self, path: &Path) -> Result<()> {
        if path.is_root() {
            return Err(TreeError::CannotDeleteRoot);
        }
        let indices = self
            .indices(path)
            .ok_or_else(|| TreeError::PathNotFound(path.clone()))?;
        let (last, parent) = indices
            .split_last()
            .ok_or(TreeError::CannotDeleteRoot)?;
        self.node_by_indices_mut(parent).children.remove(*last);
        Ok(())
    }

    fn promote_at(&mut self, path: &Path, to_mainline: bool) -> Result<()> {
        let indices = self
            .indices(path)
            .ok_or_else(|| TreeError::PathNotFound(path.clone()))?;
        for depth in (0..indices.len()).rev() {
            let idx = indices[depth];
            if idx == 0 {
                continue;
            }
            let parent = self.node_by_indices_mut(&indices[..depth]);
            let child = parent.children.remove(idx);
            parent.children.insert(0, child);
            if !to_mainline {
                break;
            }
        }
        Ok(())
    }

    fn set_shapes_at(&mut self, shapes: Vec<Shape>, path: &Path) -> Result<()> {
        self.require_mut(path)?.shapes = shapes;
        Ok(())
    }

    fn set_comment_at(&mut self, comment: Comment, path: &Path) -> Result<()> {
        let node = self.require_mut(path)?;
        match node.comments.iter_mut().find(|c| c.id == comment.id) {
            Some(existing) => *existing = comment,
            None => node.comments.push(comment),
        }
        Ok(())
    }

    fn delete_comment_at(&mut self, comment_id: &str, path: &Path) -> Result<()> {
        let node = self.require_mut(path)?;
        let before = node.comments.len();
        node.comments.retain(|c| c.id != comment_id);
        if node.comments.len() == before {
            return Err(TreeError::CommentNotFound {
                id: comment_id.to_string(),
                path: path.clone(),
            });
        }
        Ok(())
    }

    fn set_glyphs_at(&mut self, glyphs: Vec<Glyph>, path: &Path) -> Result<()> {
        self.require_mut(path)?.glyphs = glyphs;
        Ok(())
    }

    fn last_mainline_ply(&self, path: &Path) -> u32 {
        let mut node = &self.root;
        let mut rest = path.as_str();
        while !rest.is_empty() {
            match child_index(&node.children, rest) {
                Some(0) => {
                    node = &node.children[0];
                    rest = &rest[node.id.len()..];
                }
                _ => break,
            }
        }
        node.ply
    }

    fn longest_valid_path(&self, path: &Path) -> Path {
        let mut node = &self.root;
        let mut rest = path.as_str();
        let mut valid = Path::root();
        while let Some(idx) = child_index(&node.children, rest) {
            node = &node.children[idx];
            rest = &rest[node.id.len()..];
            valid = valid.child(&node.id);
        }
        valid
    }
}

// ============================================================================
// Tests
// ============================================================================
