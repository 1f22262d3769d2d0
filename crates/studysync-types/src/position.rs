//! Tree addresses: paths and chapter-scoped positions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ChapterId;

/// A node address: the concatenation of node ids walked from the root.
///
/// The empty path is the root. Equality is exact string equality; the path
/// is never parsed outside the tree store.
#[derive(Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(String);

impl Path {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The root of every chapter tree.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of a child node with the given id.
    pub fn child(&self, node_id: &str) -> Self {
        let mut s = String::with_capacity(self.0.len() + node_id.len());
        s.push_str(&self.0);
        s.push_str(node_id);
        Self(s)
    }

    /// Whether `self` lies inside the subtree rooted at `ancestor`.
    pub fn is_within(&self, ancestor: &Path) -> bool {
        self.0.starts_with(&ancestor.0)
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.0)
    }
}

/// Where in the study an event applies: a chapter and a path inside it.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub chapter_id: ChapterId,
    pub path: Path,
}

impl Position {
    pub fn new(chapter_id: impl Into<ChapterId>, path: impl Into<Path>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            path: path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_concatenates() {
        let p = Path::from("A");
        assert_eq!(p.child("B"), Path::from("AB"));
        assert_eq!(Path::root().child("e4"), Path::from("e4"));
    }

    #[test]
    fn test_is_within() {
        let deep = Path::from("ABCD");
        assert!(deep.is_within(&Path::from("AB")));
        assert!(deep.is_within(&Path::root()));
        assert!(!Path::from("AB").is_within(&deep));
    }

    #[test]
    fn test_position_wire_shape() {
        let pos: Position =
            serde_json::from_str(r#"{"chapterId":"c1","path":"AB"}"#).unwrap();
        assert_eq!(pos, Position::new("c1", "AB"));
    }
}
