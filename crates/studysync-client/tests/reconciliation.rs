//! Reconciliation properties, driven through the public controller API.
//!
//! # Tiers
//!
//! - **Tier 1:** scenarios: single broadcasts against a known replica
//! - **Tier 2:** properties: sequences of broadcasts and the invariants that
//!   must hold after each one

use std::time::Instant;

use studysync_client::{
    ChangeRequest, ClientConfig, DiscardReason, Effect, FollowMode, Outcome, Redraw,
    ReloadCause, ServerEvent, SessionOptions, StudyController, StudySnapshot, Who,
};
use studysync_tree::TreeStore;
use studysync_types::{
    Chapter, ChapterFeatures, ChapterId, ChapterSetup, Member, MemberMap, Node, Path, Position,
    Role, Study, StudyFeatures, StudySettings, UserId, Visibility,
};

// ============================================================================
// Shared test setup
// ============================================================================

const ME: &str = "sri-me";

/// root ─ A ─ B
fn tree() -> Node {
    Node::new("", 0).with_child(Node::new("A", 1).with_child(Node::new("B", 2)))
}

fn study(chapter: &str, members: &[(&str, Role)]) -> Study {
    Study {
        id: "s1".into(),
        name: "Sicilian ideas".into(),
        owner_id: "ana".into(),
        visibility: Visibility::Public,
        position: Position::new(chapter, ""),
        features: StudyFeatures::default(),
        settings: StudySettings::default(),
        chapter: Chapter {
            id: chapter.into(),
            name: chapter.to_uppercase(),
            owner_id: "ana".into(),
            setup: ChapterSetup::default(),
            features: ChapterFeatures::default(),
            practice: false,
            conceal: None,
            tags: vec![],
        },
        chapters: vec![],
        members: members
            .iter()
            .map(|(id, role)| (UserId::from(*id), Member::new(*id, *role)))
            .collect::<MemberMap>(),
        likes: 0,
        liked: false,
    }
}

fn contributor() -> StudyController {
    StudyController::new(
        StudySnapshot {
            study: study("c1", &[("ana", Role::Write), ("bo", Role::Write)]),
            tree: tree(),
        },
        SessionOptions::new(ME).with_user("ana"),
        &ClientConfig::default(),
    )
}

fn someone_else() -> Option<Who> {
    Some(Who::new("bo", "sri-bo"))
}

fn me() -> Option<Who> {
    Some(Who::new("ana", ME))
}

fn add_node(chapter: &str, parent: &str, id: &str, ply: u32, who: Option<Who>) -> ServerEvent {
    ServerEvent::AddNode {
        position: Position::new(chapter, parent),
        node: Node::new(id, ply),
        dests: None,
        opening: None,
        who,
    }
}

fn reload_count(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| matches!(e, Effect::Reload(_))).count()
}

// ============================================================================
// Tier 1: scenarios
// ============================================================================

#[test]
fn sticky_add_node_extends_tree_and_moves_view() {
    let mut ctrl = contributor();
    ctrl.handle(ServerEvent::Path {
        position: Position::new("c1", "A"),
        who: someone_else(),
    });
    // Drop B so the broadcast adds a fresh node.
    ctrl.handle(ServerEvent::DeleteNode {
        position: Position::new("c1", "AB"),
        who: someone_else(),
    });
    ctrl.drain_effects();

    let outcome = ctrl.handle(add_node("c1", "A", "B", 2, someone_else()));
    assert_eq!(outcome, Outcome::Applied);
    assert!(ctrl.tree().path_exists(&Path::from("AB")));
    assert_eq!(ctrl.view().path, Path::from("AB"));
    assert_eq!(ctrl.study().position.path, Path::from("AB"));
}

#[test]
fn pinned_client_ignores_other_chapter() {
    let mut ctrl: StudyController = StudyController::new(
        StudySnapshot {
            study: study("c2", &[("ana", Role::Write)]),
            tree: tree(),
        },
        SessionOptions::new(ME).with_user("ana").with_initial_path("A"),
        &ClientConfig::default(),
    );
    assert_eq!(ctrl.follow(), &FollowMode::Pinned(ChapterId::from("c2")));
    let before = ctrl.tree().clone();

    let outcome = ctrl.handle(add_node("c1", "A", "C", 2, someone_else()));
    assert_eq!(
        outcome,
        Outcome::Discarded(DiscardReason::ChapterMismatch {
            current: ChapterId::from("c2"),
            got: ChapterId::from("c1"),
        })
    );
    assert_eq!(ctrl.tree(), &before);
    assert!(ctrl.drain_effects().is_empty());
}

#[test]
fn own_delete_is_applied_once_on_echo() {
    let mut ctrl = contributor();
    assert!(ctrl.delete_node(Path::from("AB")));

    // Sending never touches the tree.
    assert!(ctrl.tree().path_exists(&Path::from("AB")));
    let sent: Vec<_> = ctrl
        .drain_effects()
        .into_iter()
        .filter_map(|e| match e {
            Effect::Send(c) => Some(c),
            _ => None,
        })
        .collect();
    assert!(matches!(sent.as_slice(), [ChangeRequest::DeleteNode { .. }]));

    let echo = ServerEvent::DeleteNode {
        position: Position::new("c1", "AB"),
        who: me(),
    };
    assert_eq!(ctrl.handle(echo.clone()), Outcome::Applied);
    assert!(!ctrl.tree().path_exists(&Path::from("AB")));
    assert_eq!(ctrl.tree().node_count(), 2);

    // A duplicate delivery is a divergence, not a second delete.
    assert_eq!(ctrl.handle(echo), Outcome::Recovering);
    assert_eq!(ctrl.tree().node_count(), 2);
}

#[test]
fn missing_path_triggers_exactly_one_reload() {
    let mut ctrl = contributor();
    let missing = ServerEvent::Path {
        position: Position::new("c1", "AZ"),
        who: someone_else(),
    };

    assert_eq!(ctrl.handle(missing.clone()), Outcome::Recovering);
    assert_eq!(ctrl.handle(missing), Outcome::Recovering);

    let effects = ctrl.drain_effects();
    assert_eq!(reload_count(&effects), 1);
    assert!(effects.iter().any(|e| matches!(
        e,
        Effect::Reload(r) if r.cause == ReloadCause::Divergence && r.chapter_id.is_none()
    )));
    assert_eq!(ctrl.study().position.path, Path::root());
    assert!(ctrl.view().loading);

    // Once the reload lands, divergence reloads are issued again.
    ctrl.apply_reload(StudySnapshot {
        study: study("c1", &[("ana", Role::Write)]),
        tree: tree(),
    });
    assert!(!ctrl.view().loading);
    ctrl.drain_effects();
    ctrl.handle(ServerEvent::Path {
        position: Position::new("c1", "AZ"),
        who: someone_else(),
    });
    assert_eq!(reload_count(&ctrl.drain_effects()), 1);
}

#[test]
fn reload_replaces_replica_and_redraws_fully() {
    let mut ctrl = contributor();
    ctrl.handle(ServerEvent::Reload);
    ctrl.drain_effects();

    let mut fresh = study("c1", &[("ana", Role::Write)]);
    fresh.position = Position::new("c1", "AC");
    fresh.name = "Renamed".into();
    let fresh_tree = Node::new("", 0)
        .with_child(Node::new("A", 1).with_child(Node::new("C", 2)));
    ctrl.apply_reload(StudySnapshot {
        study: fresh,
        tree: fresh_tree,
    });

    assert_eq!(ctrl.study().name, "Renamed");
    assert!(!ctrl.tree().path_exists(&Path::from("AB")));
    assert_eq!(ctrl.view().path, Path::from("AC"));
    assert!(ctrl.drain_effects().contains(&Effect::Redraw(Redraw::Full)));
}

// ============================================================================
// Tier 2: properties
// ============================================================================

#[test]
fn chapter_isolation_across_every_tree_broadcast() {
    let foreign = Position::new("c9", "A");
    let events = vec![
        ServerEvent::Path { position: foreign.clone(), who: someone_else() },
        add_node("c9", "A", "X", 2, someone_else()),
        ServerEvent::DeleteNode { position: foreign.clone(), who: someone_else() },
        ServerEvent::Promote { position: foreign.clone(), to_mainline: true, who: someone_else() },
        ServerEvent::Shapes { position: foreign.clone(), shapes: vec![], who: someone_else() },
        ServerEvent::Glyphs { position: foreign.clone(), glyphs: vec![], who: someone_else() },
        ServerEvent::DeleteComment {
            position: foreign.clone(),
            comment_id: "x".into(),
            who: someone_else(),
        },
        ServerEvent::Conceal { position: foreign, ply: Some(1) },
    ];

    for event in events {
        let mut ctrl = contributor();
        let tree_before = ctrl.tree().clone();
        let position_before = ctrl.study().position.clone();
        let kind = event.kind();

        let outcome = ctrl.handle(event);
        assert!(
            matches!(outcome, Outcome::Discarded(DiscardReason::ChapterMismatch { .. })),
            "{kind}: {outcome:?}"
        );
        assert_eq!(ctrl.tree(), &tree_before, "{kind}");
        assert_eq!(ctrl.study().position, position_before, "{kind}");
        assert_eq!(ctrl.study().chapter.conceal, None, "{kind}");
        assert!(ctrl.drain_effects().is_empty(), "{kind}");
    }
}

#[test]
fn divergence_never_mutates_tree() {
    let missing = Position::new("c1", "QQ");
    let events = vec![
        ServerEvent::Path { position: missing.clone(), who: someone_else() },
        add_node("c1", "QQ", "X", 3, someone_else()),
        ServerEvent::DeleteNode { position: missing.clone(), who: someone_else() },
        ServerEvent::Promote { position: missing.clone(), to_mainline: false, who: someone_else() },
        ServerEvent::Shapes { position: missing.clone(), shapes: vec![], who: someone_else() },
        ServerEvent::Glyphs { position: missing, glyphs: vec![], who: someone_else() },
    ];

    for event in events {
        let mut ctrl = contributor();
        let before = ctrl.tree().clone();
        let kind = event.kind();
        assert_eq!(ctrl.handle(event), Outcome::Recovering, "{kind}");
        assert_eq!(ctrl.tree(), &before, "{kind}");
        assert_eq!(reload_count(&ctrl.drain_effects()), 1, "{kind}");
    }
}

#[test]
fn sticky_view_converges_to_last_broadcast() {
    let mut ctrl = contributor();
    let events = vec![
        add_node("c1", "AB", "C", 3, someone_else()),
        ServerEvent::Path { position: Position::new("c1", "A"), who: someone_else() },
        add_node("c1", "A", "D", 2, someone_else()),
        add_node("c1", "AD", "E", 3, someone_else()),
        ServerEvent::Path { position: Position::new("c1", "ABC"), who: someone_else() },
        add_node("c1", "ADE", "F", 4, someone_else()),
    ];
    for event in events {
        ctrl.handle(event);
        assert_eq!(ctrl.view().path, ctrl.study().position.path);
    }
    assert_eq!(ctrl.view().path, Path::from("ADEF"));
}

#[test]
fn own_echoes_are_idempotent() {
    let mut ctrl = contributor();
    let echo = add_node("c1", "AB", "C", 3, me());
    ctrl.handle(echo.clone());
    let after_first = ctrl.tree().clone();
    ctrl.handle(echo);
    assert_eq!(ctrl.tree(), &after_first);
    assert_eq!(ctrl.view().path, Path::from("ABC"));
}

#[test]
fn pinned_writer_own_echo_is_applied_once() {
    let mut ctrl = contributor();
    ctrl.unstick();
    assert!(ctrl.delete_node(Path::from("AB")));
    assert!(ctrl.tree().path_exists(&Path::from("AB")));

    let echo = ServerEvent::DeleteNode {
        position: Position::new("c1", "AB"),
        who: me(),
    };
    assert_eq!(ctrl.handle(echo.clone()), Outcome::Applied);
    assert!(!ctrl.tree().path_exists(&Path::from("AB")));
    assert_eq!(ctrl.follow(), &FollowMode::Pinned(ChapterId::from("c1")));

    assert_eq!(ctrl.handle(echo), Outcome::Recovering);
    assert_eq!(ctrl.tree().node_count(), 2);
}

#[test]
fn write_gate_holds_for_non_contributors_regardless_of_write_flag() {
    let mut ctrl: StudyController = StudyController::new(
        StudySnapshot {
            study: study("c1", &[("ana", Role::Write), ("cy", Role::Read)]),
            tree: tree(),
        },
        SessionOptions::new(ME).with_user("cy"),
        &ClientConfig::default(),
    );
    for write in [true, false] {
        if ctrl.view().write != write {
            ctrl.toggle_write();
        }
        assert!(!ctrl.attempt_change(ChangeRequest::Promote {
            chapter_id: "c1".into(),
            path: Path::from("AB"),
            to_mainline: true,
        }));
        assert!(!ctrl.set_comment("hi".into()));
        assert!(!ctrl.set_shapes(vec![]));
        ctrl.user_jump(Path::from("AB"), Instant::now());
        let sends = ctrl
            .drain_effects()
            .into_iter()
            .filter(|e| matches!(e, Effect::Send(_)))
            .count();
        assert_eq!(sends, 0, "write={write}");
    }
}

#[test]
fn resync_catches_up_to_server_chapter() {
    let mut ctrl = contributor();
    ctrl.unstick();
    ctrl.handle(ServerEvent::ChangeChapter {
        position: Position::new("c2", "A"),
        who: someone_else(),
    });
    assert_eq!(ctrl.follow(), &FollowMode::Pinned(ChapterId::from("c1")));

    ctrl.resync();
    assert!(ctrl.follow().is_catching_up());
    assert_eq!(reload_count(&ctrl.drain_effects()), 1);

    let mut server = study("c2", &[("ana", Role::Write)]);
    server.position = Position::new("c2", "A");
    ctrl.apply_reload(StudySnapshot {
        study: server,
        tree: tree(),
    });
    assert!(ctrl.follow().is_sticky());
    assert_eq!(ctrl.study().chapter.id, ChapterId::from("c2"));
    assert_eq!(ctrl.view().path, Path::from("A"));
}
