//! Inbound broadcast dispatch.
//!
//! Every handler runs the same applicability pipeline, stopping at the first
//! check that fails:
//!
//! 1. record activity for the originator (always)
//! 2. tree-affecting broadcasts from others are dropped unless we follow
//!    the study; own echoes pass, since a pinned writer still sends edits
//! 3. the broadcast must be scoped to the chapter we track and have loaded
//! 4. the target path must exist locally, otherwise we reload
//! 5. apply, advance the server position, redraw
//!
//! Own echoes are applied like anyone else's broadcast since nothing was
//! applied when the change was sent; they additionally clear draft markers
//! (before any check, so a discarded echo still settles the draft) and skip
//! the view jump.

use tracing::{debug, trace, warn};

use studysync_tree::{TreeError, TreeStore};
use studysync_types::{
    ChapterId, ChapterSummary, Comment, Glyph, MemberMap, Node, Opening, Path, Position, Shape,
    Tag,
};

use crate::controller::{DiscardReason, Effect, Outcome, Redraw, StudyController};
use crate::messages::{Likes, MessageError, ServerEvent, Who, decode_frame};
use crate::recovery::ReloadCause;

impl<T: TreeStore + From<Node>> StudyController<T> {
    /// Apply one broadcast.
    pub fn handle(&mut self, event: ServerEvent) -> Outcome {
        let kind = event.kind();
        let outcome = match event {
            ServerEvent::Path { position, who } => self.on_path(position, who),
            ServerEvent::AddNode {
                position,
                node,
                dests,
                opening,
                who,
            } => self.on_add_node(position, node, dests, opening, who),
            ServerEvent::DeleteNode { position, who } => self.on_delete_node(position, who),
            ServerEvent::Promote {
                position,
                to_mainline,
                who,
            } => self.on_promote(position, to_mainline, who),
            ServerEvent::Shapes {
                position,
                shapes,
                who,
            } => self.on_shapes(position, shapes, who),
            ServerEvent::SetComment {
                position,
                comment,
                who,
            } => self.on_set_comment(position, comment, who),
            ServerEvent::DeleteComment {
                position,
                comment_id,
                who,
            } => self.on_delete_comment(position, comment_id, who),
            ServerEvent::Glyphs {
                position,
                glyphs,
                who,
            } => self.on_glyphs(position, glyphs, who),
            ServerEvent::Conceal { position, ply } => self.on_conceal(position, ply),
            ServerEvent::SetTags {
                chapter_id,
                tags,
                who,
            } => self.on_set_tags(chapter_id, tags, who),
            ServerEvent::Liking { likes, who } => self.on_liking(likes, who),
            ServerEvent::Members(members) => self.on_members(members),
            ServerEvent::Chapters(list) => self.on_chapters(list),
            ServerEvent::ChangeChapter { position, who } => self.on_change_chapter(position, who),
            ServerEvent::Reload => self.on_reload(),
            ServerEvent::Error(message) => self.on_error(message),
            ServerEvent::Crowd(crowd) => {
                self.crowd = crowd;
                self.redraw()
            }
        };
        debug!(%kind, ?outcome, "broadcast handled");
        outcome
    }

    /// Decode and apply a text frame. Unhandled frame types yield `Ok(None)`.
    pub fn handle_frame(&mut self, text: &str) -> Result<Option<Outcome>, MessageError> {
        Ok(decode_frame(text)?.map(|event| self.handle(event)))
    }

    // ── Pipeline steps ───────────────────────────────────────────────────

    fn touch(&mut self, who: Option<&Who>) {
        if let Some(who) = who {
            self.members.set_active(&who.user_id);
        }
    }

    fn require_following(&self) -> Result<(), Outcome> {
        if self.view.follow.is_sticky() {
            Ok(())
        } else {
            Err(Outcome::Discarded(DiscardReason::NotFollowing))
        }
    }

    /// The broadcast must target the chapter we track and have loaded.
    fn require_chapter(&self, got: &ChapterId) -> Result<(), Outcome> {
        for current in [self.current_chapter_id(), &self.study.chapter.id] {
            if current != got {
                return Err(Outcome::Discarded(DiscardReason::ChapterMismatch {
                    current: current.clone(),
                    got: got.clone(),
                }));
            }
        }
        Ok(())
    }

    fn require_path(&mut self, path: &Path) -> Result<(), Outcome> {
        if self.tree.path_exists(path) {
            Ok(())
        } else {
            Err(self.diverged(path))
        }
    }

    fn diverged(&mut self, path: &Path) -> Outcome {
        debug!(%path, "local tree diverged from server");
        self.request_reload(ReloadCause::Divergence, self.reload_scope());
        Outcome::Recovering
    }

    fn reload_scope(&self) -> Option<ChapterId> {
        self.view.follow.pinned_chapter().cloned()
    }

    /// Gate shared by the tree-editing broadcasts.
    fn admit_tree_edit(&mut self, position: &Position, who: Option<&Who>) -> Result<(), Outcome> {
        self.touch(who);
        if !self.echo.is_own_echo(who) {
            self.require_following()?;
        }
        self.require_chapter(&position.chapter_id)?;
        self.require_path(&position.path)
    }

    fn redraw(&mut self) -> Outcome {
        self.emit(Effect::Redraw(Redraw::Incremental));
        Outcome::Applied
    }

    /// Map a tree error from an admitted edit.
    fn tree_failed(&mut self, err: TreeError) -> Outcome {
        match err {
            TreeError::CommentNotFound { id, .. } => {
                trace!(comment = %id, "comment already gone");
                Outcome::Discarded(DiscardReason::UnknownComment(id))
            }
            TreeError::PathNotFound(path) => self.diverged(&path),
            TreeError::CannotDeleteRoot => {
                warn!("server asked to delete the root node");
                self.diverged(&Path::root())
            }
        }
    }

    // ── Handlers ─────────────────────────────────────────────────────────

    fn on_path(&mut self, position: Position, who: Option<Who>) -> Outcome {
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        self.study.position.path = position.path.clone();
        if self.echo.is_own_echo(who.as_ref()) {
            return Outcome::Applied;
        }
        self.jump_view(position.path);
        self.redraw()
    }

    fn on_add_node(
        &mut self,
        position: Position,
        node: Node,
        dests: Option<String>,
        opening: Option<Opening>,
        who: Option<Who>,
    ) -> Outcome {
        self.touch(who.as_ref());
        if let Err(outcome) = self.require_chapter(&position.chapter_id) {
            return outcome;
        }
        let Some(new_path) = self.tree.add_node(node, &position.path) else {
            return self.diverged(&position.path);
        };
        self.tree.add_dests(dests, &new_path, opening);

        self.study.position = Position::new(position.chapter_id, new_path.clone());
        let following = self.view.follow.is_sticky();
        let own = self.echo.is_own_echo(who.as_ref());
        if following || own || self.view.path == position.path {
            self.jump_view(new_path);
        }
        self.redraw()
    }

    fn on_delete_node(&mut self, position: Position, who: Option<Who>) -> Outcome {
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        if let Err(err) = self.tree.delete_node_at(&position.path) {
            return self.tree_failed(err);
        }
        self.study.position.path = self.tree.longest_valid_path(&self.study.position.path);
        let path = self.tree.longest_valid_path(&self.view.path);
        self.jump_view(path);
        self.redraw()
    }

    fn on_promote(&mut self, position: Position, to_mainline: bool, who: Option<Who>) -> Outcome {
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        if let Err(err) = self.tree.promote_at(&position.path, to_mainline) {
            return self.tree_failed(err);
        }
        self.redraw()
    }

    fn on_shapes(&mut self, position: Position, shapes: Vec<Shape>, who: Option<Who>) -> Outcome {
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        let board = !self.echo.is_own_echo(who.as_ref()) && self.view.path == position.path;
        if board {
            self.emit(Effect::BoardShapes(shapes.clone()));
        }
        if let Err(err) = self.tree.set_shapes_at(shapes, &position.path) {
            return self.tree_failed(err);
        }
        self.redraw()
    }

    fn on_set_comment(&mut self, position: Position, comment: Comment, who: Option<Who>) -> Outcome {
        if self.echo.is_own_echo(who.as_ref()) {
            self.drafts.comment_dirty = false;
        }
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        if let Err(err) = self.tree.set_comment_at(comment, &position.path) {
            return self.tree_failed(err);
        }
        self.redraw()
    }

    fn on_delete_comment(
        &mut self,
        position: Position,
        comment_id: String,
        who: Option<Who>,
    ) -> Outcome {
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        if let Err(err) = self.tree.delete_comment_at(&comment_id, &position.path) {
            return self.tree_failed(err);
        }
        self.redraw()
    }

    fn on_glyphs(&mut self, position: Position, glyphs: Vec<Glyph>, who: Option<Who>) -> Outcome {
        if self.echo.is_own_echo(who.as_ref()) {
            self.drafts.glyph_dirty = false;
        }
        if let Err(outcome) = self.admit_tree_edit(&position, who.as_ref()) {
            return outcome;
        }
        if let Err(err) = self.tree.set_glyphs_at(glyphs, &position.path) {
            return self.tree_failed(err);
        }
        self.redraw()
    }

    fn on_conceal(&mut self, position: Position, ply: Option<u32>) -> Outcome {
        if position.chapter_id != self.study.chapter.id {
            return Outcome::Discarded(DiscardReason::ChapterMismatch {
                current: self.study.chapter.id.clone(),
                got: position.chapter_id,
            });
        }
        self.study.chapter.conceal = ply;
        self.redraw()
    }

    fn on_set_tags(&mut self, chapter_id: ChapterId, tags: Vec<Tag>, who: Option<Who>) -> Outcome {
        self.touch(who.as_ref());
        if chapter_id != self.study.chapter.id {
            return Outcome::Discarded(DiscardReason::ChapterMismatch {
                current: self.study.chapter.id.clone(),
                got: chapter_id,
            });
        }
        self.study.chapter.tags = tags;
        self.redraw()
    }

    fn on_liking(&mut self, likes: Likes, who: Option<Who>) -> Outcome {
        self.touch(who.as_ref());
        self.study.likes = likes.likes;
        if self.echo.is_own_echo(who.as_ref()) {
            self.study.liked = likes.me;
        }
        self.redraw()
    }

    fn on_members(&mut self, members: MemberMap) -> Outcome {
        self.update_members(members);
        self.redraw()
    }

    fn on_chapters(&mut self, list: Vec<ChapterSummary>) -> Outcome {
        self.chapters.replace(list.clone());
        self.study.chapters = list;
        self.redraw()
    }

    fn on_change_chapter(&mut self, position: Position, who: Option<Who>) -> Outcome {
        self.touch(who.as_ref());
        self.study.position = position;
        if self.view.follow.is_sticky() {
            self.request_reload(ReloadCause::ChapterChange, None);
            return Outcome::Recovering;
        }
        self.redraw()
    }

    fn on_reload(&mut self) -> Outcome {
        self.request_reload(ReloadCause::ServerRequest, self.reload_scope());
        Outcome::Recovering
    }

    fn on_error(&mut self, message: String) -> Outcome {
        warn!(%message, "server reported an error");
        self.emit(Effect::Notify(message));
        Outcome::Applied
    }
}

// ============================================================================
// Tests
// ============================================================================
