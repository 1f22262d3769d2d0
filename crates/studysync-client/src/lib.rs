//! Client-side reconciliation for shared studies.
//!
//! A study is edited by many participants through one authoritative server.
//! Each client keeps a replica of the current chapter's tree and the server
//! position, and converges on the server's state by applying its broadcasts.
//! Nothing is applied optimistically: a local edit is only sent, and lands in
//! the replica when its broadcast comes back.
//!
//! # Layout
//!
//! - [`StudyController`] owns the replica and view state; it is synchronous
//!   and returns [`Effect`]s instead of doing I/O
//! - [`ServerEvent`] is the closed set of inbound broadcasts, dispatched by
//!   [`StudyController::handle`]
//! - [`FollowMode`] tracks sticky, pinned and catching-up states
//! - [`StudyFetcher`] is the recovery loader's data source
//! - [`spawn_session`] runs a controller on tokio, wiring a [`Transport`]
//!   and a fetcher to it
//!
//! # Example
//!
//! ```no_run
//! use studysync_client::{ClientConfig, SessionOptions, StudyController, SnapshotFetcher};
//!
//! # fn demo(json: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = SnapshotFetcher::from_json(json)?;
//! let config = ClientConfig::default();
//! let mut ctrl: StudyController = StudyController::new(
//!     fetcher.snapshot().clone(),
//!     SessionOptions::new("sri42").with_user("ana"),
//!     &config,
//! );
//! ctrl.handle_frame(r#"{"t":"path","d":{"p":{"chapterId":"c1","path":""}}}"#)?;
//! for effect in ctrl.drain_effects() {
//!     println!("{effect:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod chapters;
pub mod config;
pub mod constants;
pub mod controller;
mod dispatch;
pub mod echo;
pub mod features;
pub mod follow;
pub mod members;
pub mod messages;
pub mod outbound;
pub mod recovery;
pub mod session;
pub mod throttle;

pub use chapters::ChapterRegistry;
pub use config::{ClientConfig, ConfigError};
pub use controller::{
    DiscardReason, Effect, Outcome, Redraw, SessionOptions, SessionView, StudyController,
    UserAction,
};
pub use echo::EchoClassifier;
pub use features::FeatureGates;
pub use follow::{Drafts, FollowMode, ViewState};
pub use members::MemberRegistry;
pub use messages::{Crowd, EventKind, Likes, MessageError, ServerEvent, Who, decode_frame};
pub use outbound::ChangeRequest;
pub use recovery::{
    FetchError, ReloadCause, ReloadRequest, ReloadTracker, SnapshotFetcher, StudyFetcher,
    StudySnapshot,
};
pub use session::{SessionError, SessionHandle, Transport, spawn_session};
pub use throttle::Throttle;
