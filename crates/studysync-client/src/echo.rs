//! Recognising our own actions when the server broadcasts them back.

use studysync_types::SessionId;

use crate::messages::Who;

/// Compares a broadcast's originating session with ours.
///
/// The session id is fixed when the socket connects and never changes for
/// the life of the controller.
#[derive(Debug, Clone)]
pub struct EchoClassifier {
    session_id: SessionId,
}

impl EchoClassifier {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// True iff the broadcast originated from this very session.
    pub fn is_own_echo(&self, who: Option<&Who>) -> bool {
        who.is_some_and(|w| w.session_id == self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_on_session_not_user() {
        let echo = EchoClassifier::new(SessionId::from("s1"));
        assert!(echo.is_own_echo(Some(&Who::new("ana", "s1"))));
        // Same user on another tab is not an echo.
        assert!(!echo.is_own_echo(Some(&Who::new("ana", "s2"))));
        assert!(!echo.is_own_echo(None));
    }
}
