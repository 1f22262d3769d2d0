//! Typed identifiers for studies, chapters, users, and sessions.
//!
//! All ID types wrap the short string keys the server hands out. They're
//! opaque on the wire (plain JSON strings) and compare by exact string
//! equality. `SessionId` is the only one minted client-side: it identifies a
//! single socket connection so broadcasts can be matched back to their
//! originator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A study identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudyId(String);

/// A chapter identifier, unique within a study.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterId(String);

/// A user identifier (lowercase username).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

/// A socket session identifier, stable for the lifetime of one connection.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap a server-issued key.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// The raw key.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Check if the key is empty (never valid on the wire).
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_string_id!(StudyId, "StudyId");
impl_string_id!(ChapterId, "ChapterId");
impl_string_id!(UserId, "UserId");
impl_string_id!(SessionId, "SessionId");

impl SessionId {
    /// Length of a generated session key.
    const GENERATED_LEN: usize = 10;

    /// Mint a fresh random session key for a new connection.
    pub fn generate() -> Self {
        let hex = uuid::Uuid::new_v4().as_simple().to_string();
        Self(hex[..Self::GENERATED_LEN].to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
