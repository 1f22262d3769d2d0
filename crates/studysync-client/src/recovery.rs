//! Full-state recovery: the authoritative refetch that replaces the replica.
//!
//! The controller never performs I/O. It emits [`ReloadRequest`]s; whoever
//! drives it runs them through a [`StudyFetcher`] and feeds the resulting
//! [`StudySnapshot`] back in. [`ReloadTracker`] decides which requests are
//! worth issuing while another is still in flight.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use studysync_types::{ChapterId, Node, Study, StudyId};

/// Everything a recovery fetch returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySnapshot {
    pub study: Study,
    /// Root of the loaded chapter's analysis tree.
    #[serde(rename = "analysis")]
    pub tree: Node,
}

/// Why a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ReloadCause {
    /// A broadcast targeted a path we don't have.
    Divergence,
    /// The server asked every client to refetch.
    ServerRequest,
    /// Another participant switched chapters while we follow.
    ChapterChange,
    /// The user resynced from pinned mode.
    Resync,
    /// The user opened another chapter locally.
    LocalChapter,
}

impl ReloadCause {
    /// Explicit reloads are always issued; only divergence is coalesced.
    pub fn is_coalescible(self) -> bool {
        matches!(self, ReloadCause::Divergence)
    }
}

/// A request for the recovery loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRequest {
    /// Chapter to load, or `None` for the server's current one.
    pub chapter_id: Option<ChapterId>,
    /// Load through the practice endpoint.
    pub practice: bool,
    pub cause: ReloadCause,
}

/// Error from a recovery fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("study not found: {0}")]
    NotFound(StudyId),
    #[error("access denied")]
    Forbidden,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("bad snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of authoritative study state.
#[async_trait]
pub trait StudyFetcher: Send + Sync {
    async fn fetch(&self, study: &StudyId, req: &ReloadRequest)
        -> Result<StudySnapshot, FetchError>;
}

/// Fetcher that always serves one snapshot, e.g. a recorded fetch response.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    snapshot: StudySnapshot,
}

impl SnapshotFetcher {
    pub fn new(snapshot: StudySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_json(text: &str) -> Result<Self, FetchError> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn snapshot(&self) -> &StudySnapshot {
        &self.snapshot
    }
}

#[async_trait]
impl StudyFetcher for SnapshotFetcher {
    async fn fetch(
        &self,
        study: &StudyId,
        req: &ReloadRequest,
    ) -> Result<StudySnapshot, FetchError> {
        if *study != self.snapshot.study.id {
            return Err(FetchError::NotFound(study.clone()));
        }
        trace!(study = %study, chapter = ?req.chapter_id, "serving recorded snapshot");
        Ok(self.snapshot.clone())
    }
}

/// Counts in-flight reloads and coalesces divergence-driven ones.
#[derive(Debug, Clone)]
pub struct ReloadTracker {
    in_flight: u32,
    coalesce: bool,
}

impl ReloadTracker {
    pub fn new(coalesce: bool) -> Self {
        Self {
            in_flight: 0,
            coalesce,
        }
    }

    /// Register a reload if it should be issued.
    pub fn begin(&mut self, cause: ReloadCause) -> bool {
        if self.coalesce && cause.is_coalescible() && self.in_flight > 0 {
            debug!(%cause, in_flight = self.in_flight, "reload already in flight, coalescing");
            return false;
        }
        self.in_flight += 1;
        true
    }

    /// A reload completed or failed.
    pub fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}
