//! The study controller: sole owner of the local replica.
//!
//! [`StudyController`] holds the study document, the analysis tree and the
//! local view state. It is synchronous and performs no I/O. Inbound
//! broadcasts go through [`StudyController::handle`], local
//! actions through the named operations below, and everything the outside
//! world must do in response is queued as an [`Effect`] for the driver to
//! drain.
//!
//! # Invariants
//!
//! - The tree is only ever mutated by a confirmed broadcast or replaced
//!   wholesale by a reload. Local actions never touch it.
//! - Every outbound edit passes through [`StudyController::attempt_change`].
//! - While sticky, the view path converges to the server position once
//!   pending broadcasts and reloads have been applied.

use std::time::Instant;

use tracing::{debug, info, warn};

use studysync_tree::{AnalysisTree, TreeStore};
use studysync_types::{
    ChapterId, MemberMap, Node, Path, Position, SessionId, Shape, Study, UserId, Visibility,
};

use crate::chapters::ChapterRegistry;
use crate::config::ClientConfig;
use crate::echo::EchoClassifier;
use crate::features::FeatureGates;
use crate::follow::{Drafts, FollowMode, ViewState};
use crate::members::MemberRegistry;
use crate::messages::Crowd;
use crate::outbound::ChangeRequest;
use crate::recovery::{FetchError, ReloadCause, ReloadRequest, ReloadTracker, StudySnapshot};
use crate::throttle::Throttle;

// ============================================================================
// Effects and outcomes
// ============================================================================

/// How much of the rendering surface must be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Patch the existing view.
    Incremental,
    /// The tree instance was replaced; rebuild everything.
    Full,
}

/// Work the controller asks its driver to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a frame to the server. Fire-and-forget.
    Send(ChangeRequest),
    /// Run a recovery fetch and feed the result to
    /// [`StudyController::apply_reload`].
    Reload(ReloadRequest),
    Redraw(Redraw),
    /// Push shapes straight to a live board.
    BoardShapes(Vec<Shape>),
    /// Feature gates changed.
    Features(FeatureGates),
    /// Show a blocking notice to the user.
    Notify(String),
    /// Access may be gone; reload the whole client.
    HardReload,
}

/// What the dispatcher did with an inbound broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Dropped on purpose; see reason.
    Discarded(DiscardReason),
    /// The replica diverged; a reload was requested (or is already running).
    Recovering,
}

/// Why a broadcast was dropped without effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Tree-affecting broadcast while pinned or catching up.
    NotFollowing,
    /// Broadcast scoped to a chapter other than the one we track.
    ChapterMismatch { current: ChapterId, got: ChapterId },
    /// Comment to delete is already gone.
    UnknownComment(String),
}

// ============================================================================
// Session parameters and observable view
// ============================================================================

/// Per-connection facts injected at construction.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Socket session id, used to recognise our own echoes.
    pub session_id: SessionId,
    /// Logged-in user, `None` for anonymous viewers.
    pub user_id: Option<UserId>,
    /// Path the user deep-linked to, if any.
    pub initial_path: Option<Path>,
    /// Practice session (loads via the practice endpoint, never sticky).
    pub practice: bool,
}

impl SessionOptions {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            initial_path: None,
            practice: false,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_initial_path(mut self, path: impl Into<Path>) -> Self {
        self.initial_path = Some(path.into());
        self
    }

    pub fn with_practice(mut self, practice: bool) -> Self {
        self.practice = practice;
        self
    }
}

/// Point-in-time summary of the session for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub follow: FollowMode,
    pub write: bool,
    pub loading: bool,
    /// What the user is looking at.
    pub path: Path,
    /// The server's position.
    pub position: Position,
    /// Chapter whose tree is loaded.
    pub chapter_id: ChapterId,
    pub next_chapter_id: Option<ChapterId>,
    pub likes: u32,
    pub liked: bool,
}

/// Local user intents, as issued by a UI or a script.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    Jump(Path),
    Unstick,
    Resync,
    ToggleSticky,
    ToggleWrite,
    SetChapter { chapter_id: ChapterId, force: bool },
    DeleteNode(Path),
    Promote { path: Path, to_mainline: bool },
    SetShapes(Vec<Shape>),
    /// The comment form was edited but not submitted.
    EditComment,
    SetComment(String),
    DeleteComment(String),
    ToggleGlyph(u16),
    SetTag { name: String, value: String },
    ToggleLike,
}

// ============================================================================
// StudyController
// ============================================================================

pub struct StudyController<T = AnalysisTree> {
    pub(crate) study: Study,
    pub(crate) tree: T,
    pub(crate) members: MemberRegistry,
    pub(crate) chapters: ChapterRegistry,
    pub(crate) echo: EchoClassifier,
    pub(crate) view: ViewState,
    pub(crate) drafts: Drafts,
    pub(crate) crowd: Crowd,
    practice: bool,
    set_path: Throttle<Path>,
    reloads: ReloadTracker,
    gates: FeatureGates,
    effects: Vec<Effect>,
}

impl<T: TreeStore + From<Node>> StudyController<T> {
    /// Build a controller from the initial page payload.
    pub fn new(snapshot: StudySnapshot, opts: SessionOptions, config: &ClientConfig) -> Self {
        let StudySnapshot { study, tree } = snapshot;
        let tree = T::from(tree);
        let my_id = opts.user_id.filter(|_| !opts.practice);
        let members = MemberRegistry::new(study.members.clone(), my_id);
        let chapters = ChapterRegistry::new(study.chapters.clone());

        let deep_linked =
            opts.initial_path.is_some() || study.chapter.id != study.position.chapter_id;
        let follow = FollowMode::initial(
            study.features.sticky,
            deep_linked,
            opts.practice,
            &study.chapter.id,
        );
        let path = if follow.is_sticky() {
            tree.longest_valid_path(&study.position.path)
        } else {
            opts.initial_path
                .map(|p| tree.longest_valid_path(&p))
                .unwrap_or_default()
        };
        let gates = FeatureGates::derive(&study, members.can_contribute());

        info!(
            study = %study.id,
            chapter = %study.chapter.id,
            session = %opts.session_id,
            ?follow,
            "study session started"
        );

        Self {
            study,
            tree,
            members,
            chapters,
            echo: EchoClassifier::new(opts.session_id),
            view: ViewState::new(follow, path),
            drafts: Drafts::default(),
            crowd: Crowd::default(),
            practice: opts.practice,
            set_path: Throttle::new(config.set_path_throttle()),
            reloads: ReloadTracker::new(config.reload_coalescing),
            gates,
            effects: Vec::new(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn follow(&self) -> &FollowMode {
        &self.view.follow
    }

    pub fn members(&self) -> &MemberRegistry {
        &self.members
    }

    pub fn chapters(&self) -> &ChapterRegistry {
        &self.chapters
    }

    pub fn gates(&self) -> FeatureGates {
        self.gates
    }

    pub fn drafts(&self) -> Drafts {
        self.drafts
    }

    pub fn crowd(&self) -> &Crowd {
        &self.crowd
    }

    pub fn session_id(&self) -> &SessionId {
        self.echo.session_id()
    }

    pub fn is_practice(&self) -> bool {
        self.practice
    }

    pub fn can_contribute(&self) -> bool {
        self.members.can_contribute()
    }

    /// Chapter the client is tracking: the pinned one, else the server's.
    pub fn current_chapter_id(&self) -> &ChapterId {
        self.view
            .follow
            .pinned_chapter()
            .unwrap_or(&self.study.position.chapter_id)
    }

    /// Current chapter and view path, as stamped on outbound edits.
    pub fn with_position(&self) -> Position {
        Position {
            chapter_id: self.current_chapter_id().clone(),
            path: self.view.path.clone(),
        }
    }

    pub fn view_snapshot(&self) -> SessionView {
        SessionView {
            follow: self.view.follow.clone(),
            write: self.view.write,
            loading: self.view.loading,
            path: self.view.path.clone(),
            position: self.study.position.clone(),
            chapter_id: self.study.chapter.id.clone(),
            next_chapter_id: self.view.next_chapter_id.clone(),
            likes: self.study.likes,
            liked: self.study.liked,
        }
    }

    /// Take the queued effects, oldest first.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub(crate) fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    // ── Follow-mode transitions ──────────────────────────────────────────

    pub(crate) fn pin_current(&mut self) {
        let current = self.current_chapter_id().clone();
        self.view.follow.pin(current);
    }

    /// `Sticky | CatchingUp → Pinned(current)`.
    pub fn unstick(&mut self) {
        if self.view.follow.pinned_chapter().is_none() {
            self.pin_current();
            self.emit(Effect::Redraw(Redraw::Incremental));
        }
    }

    /// `Pinned → CatchingUp`, reloading the server's current chapter.
    pub fn resync(&mut self) {
        if !self.study.features.sticky {
            debug!("resync refused: sticky disabled for this study");
            return;
        }
        if self.view.follow.begin_catch_up() {
            self.request_reload(ReloadCause::Resync, None);
            self.emit(Effect::Redraw(Redraw::Incremental));
        }
    }

    pub fn toggle_sticky(&mut self) {
        if !self.study.features.sticky {
            self.unstick();
            return;
        }
        match self.view.follow {
            FollowMode::Sticky | FollowMode::CatchingUp => self.unstick(),
            FollowMode::Pinned(_) => self.resync(),
        }
    }

    pub fn toggle_write(&mut self) {
        self.view.write = !self.view.write;
        debug!(write = self.view.write, "write mode toggled");
        self.emit(Effect::Redraw(Redraw::Incremental));
    }

    /// View jump driven by a broadcast or reload. Never sends.
    pub(crate) fn jump_view(&mut self, path: Path) {
        self.set_path.cancel();
        self.view.path = path;
    }

    // ── Outbound Change Gate ─────────────────────────────────────────────

    /// Send `change` if the user is writing and may contribute.
    ///
    /// A user who cannot contribute is pinned as a side effect. Returns
    /// whether the change was sent.
    pub fn attempt_change(&mut self, change: ChangeRequest) -> bool {
        let can = self.members.can_contribute();
        if self.view.write && can {
            debug!(kind = change.kind(), "sending change");
            self.emit(Effect::Send(change));
            return true;
        }
        debug!(kind = change.kind(), write = self.view.write, can, "change blocked");
        if !can && self.view.follow.pinned_chapter().is_none() {
            self.pin_current();
        }
        false
    }

    // ── Local navigation ─────────────────────────────────────────────────

    /// Whether concealment lets the user see `path`.
    pub fn can_jump_to(&self, path: &Path) -> bool {
        let Some(conceal) = self.study.chapter.conceal else {
            return true;
        };
        let owns_chapter = self.members.my_id() == Some(&self.study.chapter.owner_id);
        owns_chapter || self.tree.last_mainline_ply(path) <= conceal
    }

    /// Move the view. While sticky the server is told, throttled.
    pub fn user_jump(&mut self, path: Path, now: Instant) -> bool {
        if !self.tree.path_exists(&path) {
            debug!(%path, "jump to unknown path ignored");
            return false;
        }
        if !self.can_jump_to(&path) {
            debug!(%path, "jump blocked by concealment");
            return false;
        }
        self.view.path = path.clone();
        self.emit(Effect::Redraw(Redraw::Incremental));
        if let Some(path) = self.set_path.offer(path, now) {
            self.flush_set_path(path);
        }
        true
    }

    /// Fire a trailing `setPath` if its time has come.
    pub fn tick(&mut self, now: Instant) {
        if let Some(path) = self.set_path.poll(now) {
            self.flush_set_path(path);
        }
    }

    /// When [`tick`](Self::tick) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.set_path.deadline()
    }

    fn flush_set_path(&mut self, path: Path) {
        if !self.view.follow.is_sticky() || path == self.study.position.path {
            return;
        }
        let chapter_id = self.current_chapter_id().clone();
        self.attempt_change(ChangeRequest::SetPath { chapter_id, path });
    }

    /// Open another chapter.
    ///
    /// Contributors following the study move everyone; anyone else switches
    /// locally, pinning the new chapter.
    pub fn set_chapter(&mut self, chapter_id: ChapterId, force: bool) {
        if chapter_id == *self.current_chapter_id() && !force {
            return;
        }
        let sent = self.attempt_change(ChangeRequest::SetChapter(chapter_id.clone()));
        if !sent || !self.view.follow.is_sticky() {
            self.view.follow.pin(chapter_id.clone());
            self.request_reload(ReloadCause::LocalChapter, Some(chapter_id.clone()));
        }
        self.view.loading = true;
        self.view.next_chapter_id = Some(chapter_id);
        self.emit(Effect::Redraw(Redraw::Incremental));
    }

    // ── Outbound edits ───────────────────────────────────────────────────

    pub fn delete_node(&mut self, path: Path) -> bool {
        let Position { chapter_id, path: jump_to } = self.with_position();
        self.attempt_change(ChangeRequest::DeleteNode {
            chapter_id,
            path,
            jump_to,
        })
    }

    pub fn promote(&mut self, path: Path, to_mainline: bool) -> bool {
        let chapter_id = self.current_chapter_id().clone();
        self.attempt_change(ChangeRequest::Promote {
            chapter_id,
            path,
            to_mainline,
        })
    }

    /// Shapes drawn by spectators stay local.
    pub fn set_shapes(&mut self, shapes: Vec<Shape>) -> bool {
        if !self.members.can_contribute() {
            return false;
        }
        let Position { chapter_id, path } = self.with_position();
        self.attempt_change(ChangeRequest::Shapes {
            chapter_id,
            path,
            shapes,
        })
    }

    pub fn edit_comment(&mut self) {
        self.drafts.comment_dirty = true;
    }

    pub fn set_comment(&mut self, text: String) -> bool {
        let Position { chapter_id, path } = self.with_position();
        let sent = self.attempt_change(ChangeRequest::SetComment {
            chapter_id,
            path,
            text,
        });
        if sent {
            self.drafts.comment_dirty = true;
        }
        sent
    }

    pub fn delete_comment(&mut self, id: String) -> bool {
        let Position { chapter_id, path } = self.with_position();
        self.attempt_change(ChangeRequest::DeleteComment {
            chapter_id,
            path,
            id,
        })
    }

    pub fn toggle_glyph(&mut self, id: u16) -> bool {
        let Position { chapter_id, path } = self.with_position();
        let sent = self.attempt_change(ChangeRequest::ToggleGlyph {
            chapter_id,
            path,
            id,
        });
        if sent {
            self.drafts.glyph_dirty = true;
        }
        sent
    }

    pub fn set_tag(&mut self, name: String, value: String) -> bool {
        let chapter_id = self.study.chapter.id.clone();
        self.attempt_change(ChangeRequest::SetTag {
            chapter_id,
            name,
            value,
        })
    }

    /// Any viewer may like a study; this skips the write gate.
    pub fn toggle_like(&mut self) {
        let liked = !self.study.liked;
        self.emit(Effect::Send(ChangeRequest::Like { liked }));
    }

    /// Route a [`UserAction`] to its operation.
    pub fn perform(&mut self, action: UserAction, now: Instant) {
        match action {
            UserAction::Jump(path) => {
                self.user_jump(path, now);
            }
            UserAction::Unstick => self.unstick(),
            UserAction::Resync => self.resync(),
            UserAction::ToggleSticky => self.toggle_sticky(),
            UserAction::ToggleWrite => self.toggle_write(),
            UserAction::SetChapter { chapter_id, force } => self.set_chapter(chapter_id, force),
            UserAction::DeleteNode(path) => {
                self.delete_node(path);
            }
            UserAction::Promote { path, to_mainline } => {
                self.promote(path, to_mainline);
            }
            UserAction::SetShapes(shapes) => {
                self.set_shapes(shapes);
            }
            UserAction::EditComment => self.edit_comment(),
            UserAction::SetComment(text) => {
                self.set_comment(text);
            }
            UserAction::DeleteComment(id) => {
                self.delete_comment(id);
            }
            UserAction::ToggleGlyph(id) => {
                self.toggle_glyph(id);
            }
            UserAction::SetTag { name, value } => {
                self.set_tag(name, value);
            }
            UserAction::ToggleLike => self.toggle_like(),
        }
    }

    // ── Feature configuration ────────────────────────────────────────────

    /// Re-derive gates and apply them. Emits [`Effect::Features`] when they
    /// change, or always with `announce`.
    pub(crate) fn configure_features(&mut self, announce: bool) {
        let gates = FeatureGates::derive(&self.study, self.members.can_contribute());
        if !gates.sticky && self.view.follow.pinned_chapter().is_none() {
            self.pin_current();
        }
        if announce || gates != self.gates {
            debug!(?gates, "feature gates updated");
            self.gates = gates;
            self.emit(Effect::Features(gates));
        }
    }

    /// Apply a new roster; revoke write and stickiness on demotion.
    pub(crate) fn update_members(&mut self, members: MemberMap) {
        let could = self.members.can_contribute();
        self.members.replace(members.clone());
        self.study.members = members;
        if could && !self.members.can_contribute() && self.view.write {
            info!("contribution rights revoked");
            self.view.write = false;
            self.pin_current();
        }
        self.configure_features(false);
    }

    // ── Recovery ─────────────────────────────────────────────────────────

    /// Queue a reload unless it is coalesced into one already running.
    pub(crate) fn request_reload(&mut self, cause: ReloadCause, scope: Option<ChapterId>) -> bool {
        if !self.reloads.begin(cause) {
            return false;
        }
        info!(%cause, chapter = ?scope, "requesting study reload");
        self.view.loading = true;
        self.emit(Effect::Reload(ReloadRequest {
            chapter_id: scope,
            practice: self.practice,
            cause,
        }));
        true
    }

    /// Replace the replica with a fetched snapshot.
    pub fn apply_reload(&mut self, snapshot: StudySnapshot) {
        self.reloads.finish();
        self.view.loading = self.reloads.is_loading();
        let StudySnapshot { study, tree } = snapshot;

        if self.study.visibility == Visibility::Public
            && study.visibility == Visibility::Private
            && self.members.my_member().is_none()
        {
            warn!(study = %study.id, "study went private and we are not a member");
            self.emit(Effect::HardReload);
            return;
        }

        if study.position != self.study.position {
            self.drafts = Drafts::default();
        }
        self.members.replace(study.members.clone());
        self.chapters.replace(study.chapters.clone());
        self.tree = T::from(tree);
        self.study = study;

        self.view.follow.finish_catch_up();
        let loaded = self.study.chapter.id.clone();
        if self.view.follow.pinned_chapter().is_some_and(|c| *c != loaded) {
            self.view.follow.pin(loaded);
        }
        let path = if self.view.follow.is_sticky() {
            self.tree.longest_valid_path(&self.study.position.path)
        } else {
            Path::root()
        };
        self.jump_view(path);
        self.view.next_chapter_id = None;

        info!(
            chapter = %self.study.chapter.id,
            path = %self.view.path,
            follow = ?self.view.follow,
            "study reloaded"
        );
        self.configure_features(true);
        self.emit(Effect::Redraw(Redraw::Full));
    }

    /// A reload request failed. The replica stays as it was.
    pub fn reload_failed(&mut self, err: &FetchError) {
        self.reloads.finish();
        self.view.loading = self.reloads.is_loading();
        warn!(error = %err, "study reload failed");
        self.emit(Effect::Redraw(Redraw::Incremental));
    }
}

// ============================================================================
// Tests
// ============================================================================
