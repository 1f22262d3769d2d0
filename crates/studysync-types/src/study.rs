//! Study, chapter, and member metadata.
//!
//! A `Study` is the shared document: a list of chapters, a member roster,
//! and the server's authoritative position. Exactly one `Chapter` is loaded
//! at a time; the rest are known only by [`ChapterSummary`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids::{ChapterId, StudyId, UserId};
use crate::position::Position;

/// Members keyed by user id, in server order.
pub type MemberMap = IndexMap<UserId, Member>;

/// Who may see the study.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Study-wide feature switches derived by the server from its settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyFeatures {
    #[serde(default)]
    pub cloneable: bool,
    #[serde(default = "default_true")]
    pub chat: bool,
    #[serde(default = "default_true")]
    pub sticky: bool,
}

impl Default for StudyFeatures {
    fn default() -> Self {
        Self {
            cloneable: false,
            chat: true,
            sticky: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Raw owner-editable settings; the client only stores and echoes them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySettings {
    #[serde(default)]
    pub computer: String,
    #[serde(default)]
    pub explorer: String,
    #[serde(default)]
    pub cloneable: String,
    #[serde(default)]
    pub chat: String,
    #[serde(default)]
    pub sticky: bool,
}

/// The study document as returned by a full reload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub id: StudyId,
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub visibility: Visibility,
    pub position: Position,
    #[serde(default)]
    pub features: StudyFeatures,
    #[serde(default)]
    pub settings: StudySettings,
    pub chapter: Chapter,
    #[serde(default)]
    pub chapters: Vec<ChapterSummary>,
    #[serde(default)]
    pub members: MemberMap,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub liked: bool,
}

/// Per-chapter analysis switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterFeatures {
    #[serde(default = "default_true")]
    pub computer: bool,
    #[serde(default = "default_true")]
    pub explorer: bool,
}

impl Default for ChapterFeatures {
    fn default() -> Self {
        Self {
            computer: true,
            explorer: true,
        }
    }
}

/// Chess variant a chapter is set up in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub key: String,
    #[serde(default)]
    pub name: String,
}

impl Default for Variant {
    fn default() -> Self {
        Self {
            key: "standard".to_string(),
            name: "Standard".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterSetup {
    #[serde(default)]
    pub variant: Variant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_fen: Option<bool>,
}

/// A PGN tag pair (`["White", "Carlsen"]` on the wire).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag(pub String, pub String);

/// The currently loaded chapter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    #[serde(default)]
    pub name: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub setup: ChapterSetup,
    #[serde(default)]
    pub features: ChapterFeatures,
    #[serde(default)]
    pub practice: bool,
    /// Nodes past this ply are hidden from non-owners.
    #[serde(default)]
    pub conceal: Option<u32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A chapter as listed in the chapter registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub id: ChapterId,
    pub name: String,
}

/// A member's permission level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Role {
    #[default]
    #[serde(rename = "r")]
    #[strum(serialize = "r")]
    Read,
    #[serde(rename = "w")]
    #[strum(serialize = "w")]
    Write,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
}

/// A study member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user: UserRef,
    #[serde(default)]
    pub role: Role,
    /// Last activity seen from this member (Unix millis). Client-side only.
    #[serde(skip)]
    pub active_at: Option<u64>,
}

impl Member {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        let id = user_id.into();
        Self {
            user: UserRef {
                name: id.to_string(),
                id,
            },
            role,
            active_at: None,
        }
    }

    pub fn can_contribute(&self) -> bool {
        self.role == Role::Write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDY_JSON: &str = r#"{
        "id": "s1",
        "name": "Najdorf",
        "ownerId": "ana",
        "visibility": "unlisted",
        "position": {"chapterId": "c1", "path": ""},
        "features": {"cloneable": true, "chat": true, "sticky": true},
        "chapter": {"id": "c1", "ownerId": "ana", "conceal": 12,
                    "tags": [["White", "Fischer"]]},
        "chapters": [{"id": "c1", "name": "Intro"}],
        "members": {"ana": {"user": {"id": "ana", "name": "Ana"}, "role": "w"},
                    "bo": {"user": {"id": "bo", "name": "Bo"}, "role": "r"}},
        "likes": 3,
        "liked": false
    }"#;

    #[test]
    fn test_study_decodes() {
        let s: Study = serde_json::from_str(STUDY_JSON).unwrap();
        assert_eq!(s.visibility, Visibility::Unlisted);
        assert_eq!(s.chapter.conceal, Some(12));
        assert_eq!(s.chapter.tags[0], Tag("White".into(), "Fischer".into()));
        assert!(s.chapter.features.computer);
        assert_eq!(s.chapter.setup.variant.key, "standard");
        assert_eq!(s.members.len(), 2);
        assert!(s.members[&UserId::from("ana")].can_contribute());
        assert!(!s.members[&UserId::from("bo")].can_contribute());
    }

    #[test]
    fn test_member_order_preserved() {
        let s: Study = serde_json::from_str(STUDY_JSON).unwrap();
        let ids: Vec<_> = s.members.keys().map(|k| k.as_str()).collect();
        assert_eq!(ids, vec!["ana", "bo"]);
    }

    #[test]
    fn test_visibility_strings() {
        assert_eq!(Visibility::Private.to_string(), "private");
        assert_eq!("public".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!(Role::Write.to_string(), "w");
    }
}
