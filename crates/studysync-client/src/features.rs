//! Feature gating derived from study and chapter facts.

use studysync_types::Study;

/// What the client may do right now. Recomputed after every roster or
/// document change and applied idempotently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureGates {
    /// The local user may send edits.
    pub write: bool,
    /// The study allows sticky mode.
    pub sticky: bool,
    /// Engine evaluation allowed.
    pub computer: bool,
    /// Opening explorer allowed.
    pub explorer: bool,
    /// Study chat accepts messages.
    pub chat_writeable: bool,
    /// Local chat moderation permissions.
    pub chat_local: bool,
}

impl FeatureGates {
    pub fn derive(study: &Study, can_contribute: bool) -> Self {
        let chapter = &study.chapter;
        Self {
            write: can_contribute,
            sticky: study.features.sticky,
            computer: chapter.features.computer || chapter.practice,
            explorer: chapter.features.explorer,
            chat_writeable: study.features.chat,
            chat_local: can_contribute,
        }
    }
}
