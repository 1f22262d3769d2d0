//! Server-push broadcast types and frame decoding.
//!
//! Provides [`ServerEvent`], a closed enum of every broadcast the study
//! socket delivers, and [`decode_frame`] to turn a raw `{"t": .., "d": ..}`
//! text frame into one. Frame types the client doesn't handle (presence
//! widgets, invite forms) decode to `Ok(None)` rather than an error.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use tracing::trace;

use studysync_types::{
    ChapterId, ChapterSummary, Comment, Glyph, MemberMap, Node, Opening, Position, SessionId,
    Shape, Tag, UserId,
};

/// Error decoding an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed frame: {0}")]
    Frame(#[source] serde_json::Error),
    #[error("bad {kind} payload: {source}")]
    Payload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Originator of a broadcast: user and socket session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Who {
    #[serde(rename = "u")]
    pub user_id: UserId,
    #[serde(rename = "s")]
    pub session_id: SessionId,
}

impl Who {
    pub fn new(user_id: impl Into<UserId>, session_id: impl Into<SessionId>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// Like counter broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Likes {
    pub likes: u32,
    /// Whether the originator now likes the study.
    pub me: bool,
}

/// Spectator snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crowd {
    #[serde(default)]
    pub nb: u32,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub anons: u32,
}

/// Broadcasts pushed from the server to every participant of a study.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "camelCase")]
pub enum ServerEvent {
    /// The shared position moved within a chapter.
    Path {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    /// A move was played at `position.path`.
    AddNode {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "n")]
        node: Node,
        #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
        dests: Option<String>,
        #[serde(rename = "o", default, skip_serializing_if = "Option::is_none")]
        opening: Option<Opening>,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    DeleteNode {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    Promote {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "toMainline")]
        to_mainline: bool,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    Shapes {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "s")]
        shapes: Vec<Shape>,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    SetComment {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "c")]
        comment: Comment,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    DeleteComment {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "id")]
        comment_id: String,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    Glyphs {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "g")]
        glyphs: Vec<Glyph>,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    /// The chapter's concealment threshold changed (`None` reveals all).
    Conceal {
        #[serde(rename = "p")]
        position: Position,
        #[serde(default)]
        ply: Option<u32>,
    },
    SetTags {
        #[serde(rename = "chapterId")]
        chapter_id: ChapterId,
        tags: Vec<Tag>,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    Liking {
        #[serde(rename = "l")]
        likes: Likes,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    Members(MemberMap),
    Chapters(Vec<ChapterSummary>),
    /// Someone moved the study to another chapter.
    ChangeChapter {
        #[serde(rename = "p")]
        position: Position,
        #[serde(rename = "w", default, skip_serializing_if = "Option::is_none")]
        who: Option<Who>,
    },
    /// The server wants every client to refetch.
    Reload,
    Error(String),
    Crowd(Crowd),
}

/// Frame type tags, as they appear in `t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    Path,
    AddNode,
    DeleteNode,
    Promote,
    Shapes,
    SetComment,
    DeleteComment,
    Glyphs,
    Conceal,
    SetTags,
    Liking,
    Members,
    Chapters,
    ChangeChapter,
    Reload,
    Error,
    Crowd,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Path { .. } => EventKind::Path,
            ServerEvent::AddNode { .. } => EventKind::AddNode,
            ServerEvent::DeleteNode { .. } => EventKind::DeleteNode,
            ServerEvent::Promote { .. } => EventKind::Promote,
            ServerEvent::Shapes { .. } => EventKind::Shapes,
            ServerEvent::SetComment { .. } => EventKind::SetComment,
            ServerEvent::DeleteComment { .. } => EventKind::DeleteComment,
            ServerEvent::Glyphs { .. } => EventKind::Glyphs,
            ServerEvent::Conceal { .. } => EventKind::Conceal,
            ServerEvent::SetTags { .. } => EventKind::SetTags,
            ServerEvent::Liking { .. } => EventKind::Liking,
            ServerEvent::Members(_) => EventKind::Members,
            ServerEvent::Chapters(_) => EventKind::Chapters,
            ServerEvent::ChangeChapter { .. } => EventKind::ChangeChapter,
            ServerEvent::Reload => EventKind::Reload,
            ServerEvent::Error(_) => EventKind::Error,
            ServerEvent::Crowd(_) => EventKind::Crowd,
        }
    }

    /// Encode as a wire frame (used by tests and the replay tool).
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Deserialize)]
struct RawFrame {
    t: String,
    #[serde(default)]
    d: serde_json::Value,
}

/// Decode a text frame. Unknown frame types yield `Ok(None)`.
pub fn decode_frame(text: &str) -> Result<Option<ServerEvent>, MessageError> {
    let raw: RawFrame = serde_json::from_str(text).map_err(MessageError::Frame)?;
    let Ok(kind) = raw.t.parse::<EventKind>() else {
        trace!(t = %raw.t, "ignoring unhandled frame type");
        return Ok(None);
    };
    let tagged = serde_json::json!({ "t": raw.t, "d": raw.d });
    serde_json::from_value(tagged)
        .map(Some)
        .map_err(|source| MessageError::Payload { kind, source })
}

// ============================================================================
// Tests
// ============================================================================
