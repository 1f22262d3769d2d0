//! Locally-initiated change requests.
//!
//! Every edit a user makes is sent to the server as a [`ChangeRequest`] and
//! only lands in the local tree when the server's broadcast comes back. The
//! gate that decides whether a request may be sent lives on the controller
//! ([`StudyController::attempt_change`](crate::StudyController::attempt_change)).

use serde::{Deserialize, Serialize};

use studysync_types::{ChapterId, Path, Shape};

/// An outbound frame, serialized as `{"t": .., "d": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "camelCase")]
pub enum ChangeRequest {
    SetPath {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
    },
    DeleteNode {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        /// Where the sender's view should land afterwards.
        #[serde(rename = "jumpTo")]
        jump_to: Path,
    },
    Promote {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        #[serde(rename = "toMainline")]
        to_mainline: bool,
    },
    SetChapter(ChapterId),
    Shapes {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        shapes: Vec<Shape>,
    },
    SetComment {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        text: String,
    },
    DeleteComment {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        id: String,
    },
    ToggleGlyph {
        #[serde(rename = "ch")]
        chapter_id: ChapterId,
        path: Path,
        id: u16,
    },
    SetTag {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
        name: String,
        value: String,
    },
    Like {
        liked: bool,
    },
}

impl ChangeRequest {
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Frame type tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeRequest::SetPath { .. } => "setPath",
            ChangeRequest::DeleteNode { .. } => "deleteNode",
            ChangeRequest::Promote { .. } => "promote",
            ChangeRequest::SetChapter(_) => "setChapter",
            ChangeRequest::Shapes { .. } => "shapes",
            ChangeRequest::SetComment { .. } => "setComment",
            ChangeRequest::DeleteComment { .. } => "deleteComment",
            ChangeRequest::ToggleGlyph { .. } => "toggleGlyph",
            ChangeRequest::SetTag { .. } => "setTag",
            ChangeRequest::Like { .. } => "like",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_path_frame() {
        let change = ChangeRequest::SetPath {
            chapter_id: ChapterId::from("c1"),
            path: Path::from("AB"),
        };
        assert_eq!(
            change.to_frame().unwrap(),
            r#"{"t":"setPath","d":{"ch":"c1","path":"AB"}}"#
        );
    }

    #[test]
    fn test_set_chapter_frame() {
        let change = ChangeRequest::SetChapter(ChapterId::from("c9"));
        assert_eq!(change.to_frame().unwrap(), r#"{"t":"setChapter","d":"c9"}"#);
        assert_eq!(change.kind(), "setChapter");
    }

    #[test]
    fn test_delete_node_frame_carries_jump_target() {
        let change = ChangeRequest::DeleteNode {
            chapter_id: ChapterId::from("c1"),
            path: Path::from("AB"),
            jump_to: Path::from("A"),
        };
        let frame = change.to_frame().unwrap();
        assert!(frame.contains(r#""jumpTo":"A""#));
    }
}
