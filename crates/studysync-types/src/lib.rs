//! Shared identity and document types for studysync.
//!
//! This crate is the leaf of the workspace: typed IDs, tree addresses, nodes,
//! and study/chapter/member metadata. It has **no internal studysync
//! dependencies**.
//!
//! # Overview
//!
//! ```text
//! Study (StudyId) ← the shared document
//!     └── owned by a user (UserId)
//!     └── lists Chapters (ChapterSummary), one loaded at a time (Chapter)
//!     └── has Members (UserId → Member, read or write role)
//!     └── has a server Position (ChapterId + Path)
//!
//! Chapter (ChapterId)
//!     └── owns an analysis tree of Nodes, addressed by Path
//!
//! SessionId ← one socket connection, used to recognise echoes
//! ```

pub mod ids;
pub mod node;
pub mod position;
pub mod study;

pub use ids::{ChapterId, SessionId, StudyId, UserId};
pub use node::{Comment, CommentAuthor, Glyph, Node, Opening, Shape};
pub use position::{Path, Position};
pub use study::{
    Chapter, ChapterFeatures, ChapterSetup, ChapterSummary, Member, MemberMap, Role, Study,
    StudyFeatures, StudySettings, Tag, UserRef, Variant, Visibility,
};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
