//! Async driver that owns a [`StudyController`] for the life of a socket.
//!
//! The controller is synchronous; this task feeds it inbound frames, user
//! actions, throttle expiries and finished reloads, strictly one at a time,
//! and carries out the effects it queues.
//!
//! ```text
//!   SessionHandle (Clone)       mpsc       session task
//!   ┌─────────────────────┐  ────────▶  ┌──────────────────────────────┐
//!   │ .push_frame()       │             │ StudyController              │
//!   │ .act()              │             │ reloads: FuturesUnordered    │
//!   │ .view() / .watch()  │  ◀────────  │ setPath throttle timer       │
//!   └─────────────────────┘ watch/bcast └──────────────────────────────┘
//! ```

use std::sync::Arc;

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, warn};

use studysync_tree::TreeStore;
use studysync_types::{Node, StudyId};

use crate::config::ClientConfig;
use crate::constants::NOTICE_BUFFER;
use crate::controller::{Effect, SessionView, StudyController, UserAction};
use crate::recovery::{FetchError, StudyFetcher, StudySnapshot};

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session shut down")]
    Shutdown,
    #[error("transport closed")]
    TransportClosed,
}

// ============================================================================
// Transport
// ============================================================================

/// Outbound half of the study socket. Sends are fire-and-forget.
pub trait Transport: Send + 'static {
    fn send(&self, frame: String) -> Result<(), SessionError>;
}

impl Transport for mpsc::UnboundedSender<String> {
    fn send(&self, frame: String) -> Result<(), SessionError> {
        mpsc::UnboundedSender::send(self, frame).map_err(|_| SessionError::TransportClosed)
    }
}

// ============================================================================
// Commands (internal)
// ============================================================================

enum SessionCommand {
    Frame(String),
    User(UserAction),
    Shutdown,
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Cloneable handle to a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
    notices: broadcast::Sender<Effect>,
}

impl SessionHandle {
    /// Hand an inbound socket frame to the session.
    pub async fn push_frame(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Frame(text.into()))
            .await
            .map_err(|_| SessionError::Shutdown)
    }

    /// Perform a local user action.
    pub async fn act(&self, action: UserAction) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::User(action))
            .await
            .map_err(|_| SessionError::Shutdown)
    }

    /// Latest published view.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Render-side effects: redraws, board shapes, feature changes, notices.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Effect> {
        self.notices.subscribe()
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::Shutdown)
    }
}

// ============================================================================
// Session task
// ============================================================================

type FetchFuture = BoxFuture<'static, Result<StudySnapshot, FetchError>>;

struct Session<T, X> {
    controller: StudyController<T>,
    transport: X,
    fetcher: Arc<dyn StudyFetcher>,
    study_id: StudyId,
    view: watch::Sender<SessionView>,
    notices: broadcast::Sender<Effect>,
    reloads: FuturesUnordered<FetchFuture>,
}

impl<T, X> Session<T, X>
where
    T: TreeStore + From<Node> + Send + 'static,
    X: Transport,
{
    async fn run(mut self, mut rx: mpsc::Receiver<SessionCommand>) {
        loop {
            let deadline = self.controller.next_deadline();
            let wake = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(tokio::time::Instant::now);

            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(SessionCommand::Frame(text)) => self.on_frame(&text),
                    Some(SessionCommand::User(action)) => {
                        self.controller.perform(action, now());
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(result) = self.reloads.next(), if !self.reloads.is_empty() => match result {
                    Ok(snapshot) => self.controller.apply_reload(snapshot),
                    Err(e) => self.controller.reload_failed(&e),
                },
                _ = tokio::time::sleep_until(wake), if deadline.is_some() => {
                    self.controller.tick(now());
                }
            }
            self.flush();
        }
        debug!(study = %self.study_id, "session shutting down");
    }

    fn on_frame(&mut self, text: &str) {
        if let Err(e) = self.controller.handle_frame(text) {
            warn!(error = %e, "dropping undecodable frame");
        }
    }

    /// Carry out queued effects and publish the new view.
    fn flush(&mut self) {
        for effect in self.controller.drain_effects() {
            match effect {
                Effect::Send(change) => match change.to_frame() {
                    Ok(frame) => {
                        if let Err(e) = self.transport.send(frame) {
                            warn!(kind = change.kind(), error = %e, "send failed");
                        }
                    }
                    Err(e) => error!(kind = change.kind(), error = %e, "failed to encode change"),
                },
                Effect::Reload(req) => {
                    let fetcher = Arc::clone(&self.fetcher);
                    let study = self.study_id.clone();
                    self.reloads
                        .push(Box::pin(async move { fetcher.fetch(&study, &req).await }));
                }
                notice => {
                    // No subscribers is fine.
                    let _ = self.notices.send(notice);
                }
            }
        }
        self.view.send_replace(self.controller.view_snapshot());
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

/// Spawn a session task on the current tokio runtime.
pub fn spawn_session<T, X>(
    controller: StudyController<T>,
    transport: X,
    fetcher: Arc<dyn StudyFetcher>,
    config: &ClientConfig,
) -> SessionHandle
where
    T: TreeStore + From<Node> + Send + 'static,
    X: Transport,
{
    let (tx, rx) = mpsc::channel(config.event_buffer.max(1));
    let (view_tx, view_rx) = watch::channel(controller.view_snapshot());
    let (notices, _) = broadcast::channel(NOTICE_BUFFER);
    let study_id = controller.study().id.clone();

    let session = Session {
        controller,
        transport,
        fetcher,
        study_id,
        view: view_tx,
        notices: notices.clone(),
        reloads: FuturesUnordered::new(),
    };
    tokio::spawn(session.run(rx));

    SessionHandle {
        tx,
        view: view_rx,
        notices,
    }
}
