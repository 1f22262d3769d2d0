//! Follow-mode state machine and the rest of the local view state.
//!
//! # State Machine
//!
//! ```text
//!             unstick / contribution revoked / sticky feature off
//!   +--------+ ------------------------------------------> +------------+
//!   | Sticky |                                            | Pinned(ch) |
//!   +--------+ <--+                                       +------------+
//!                 | reload applied                              |
//!            +------------+            resync                   |
//!            | CatchingUp | <-----------------------------------+
//!            +------------+
//! ```
//!
//! `write` is a separate flag: losing write access and leaving sticky mode
//! are independent transitions even when one event triggers both.

use studysync_types::{ChapterId, Path};
use tracing::debug;

/// Whether the client mirrors the server's position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowMode {
    /// Mirror the server position across chapter switches by anyone.
    Sticky,
    /// Browse this chapter independently of the live feed.
    Pinned(ChapterId),
    /// Resyncing into sticky mode; a reload is in flight and view jumps are
    /// held back until it lands.
    CatchingUp,
}

impl FollowMode {
    /// Starting mode for a fresh session.
    ///
    /// Sticky only when the study allows it, the user didn't arrive on a
    /// specific path or chapter, and this isn't a practice session.
    pub fn initial(
        sticky_feature: bool,
        deep_linked: bool,
        practice: bool,
        loaded_chapter: &ChapterId,
    ) -> Self {
        if sticky_feature && !deep_linked && !practice {
            FollowMode::Sticky
        } else {
            FollowMode::Pinned(loaded_chapter.clone())
        }
    }

    pub fn is_sticky(&self) -> bool {
        matches!(self, FollowMode::Sticky)
    }

    pub fn is_catching_up(&self) -> bool {
        matches!(self, FollowMode::CatchingUp)
    }

    pub fn pinned_chapter(&self) -> Option<&ChapterId> {
        match self {
            FollowMode::Pinned(c) => Some(c),
            _ => None,
        }
    }

    /// Stop following, staying on `viewing`.
    pub fn pin(&mut self, viewing: ChapterId) {
        if self.pinned_chapter() != Some(&viewing) {
            debug!(from = ?self, to = %viewing, "pinning view");
        }
        *self = FollowMode::Pinned(viewing);
    }

    /// `Pinned → CatchingUp`. Returns false from any other state.
    pub fn begin_catch_up(&mut self) -> bool {
        if let FollowMode::Pinned(_) = self {
            debug!(from = ?self, "catching up");
            *self = FollowMode::CatchingUp;
            true
        } else {
            false
        }
    }

    /// `CatchingUp → Sticky`, once the resync reload has been applied.
    pub fn finish_catch_up(&mut self) {
        if self.is_catching_up() {
            *self = FollowMode::Sticky;
        }
    }
}

/// Local-only view state. Never persisted.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub follow: FollowMode,
    /// User wants to edit. Only effective together with contribution rights.
    pub write: bool,
    /// A recovery load is in flight.
    pub loading: bool,
    /// Chapter a local switch is waiting on.
    pub next_chapter_id: Option<ChapterId>,
    /// The node the user is looking at. May differ from the server position.
    pub path: Path,
}

impl ViewState {
    pub fn new(follow: FollowMode, path: Path) -> Self {
        Self {
            follow,
            write: true,
            loading: false,
            next_chapter_id: None,
            path,
        }
    }
}

/// Unsent edit state in the comment and glyph forms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drafts {
    pub comment_dirty: bool,
    pub glyph_dirty: bool,
}
