//! Analysis tree nodes and their annotations.
//!
//! These are the serializable shapes that travel in `addNode` broadcasts and
//! in full reload payloads. The tree store owns the structure; this module
//! only describes what a node carries.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A move node. `id` is assigned by the server and is unique among siblings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub ply: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    #[serde(default)]
    pub fen: String,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub glyphs: Vec<Glyph>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<Shape>,
    /// Legal destinations, filled in lazily from `addNode` payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening: Option<Opening>,
}

impl Node {
    /// A bare node with no move (tree root or test fixture).
    pub fn new(id: impl Into<String>, ply: u32) -> Self {
        Self {
            id: id.into(),
            ply,
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }
}

/// A comment attached to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub by: CommentAuthor,
    pub text: String,
}

/// Who wrote a comment: a study member, or an external source (e.g. a PGN).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentAuthor {
    User {
        id: UserId,
        #[serde(default)]
        name: String,
    },
    External(String),
}

/// A symbolic move/position annotation such as `!?` or `+-`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: u16,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

/// A board drawing: a circle on `orig`, or an arrow `orig → dest`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub orig: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    pub brush: String,
}

/// Opening classification attached to a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub eco: String,
    pub name: String,
}
