//! Session driver tests with an in-memory socket and fetcher.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use studysync_client::{
    ClientConfig, Effect, FetchError, FollowMode, ReloadRequest, ServerEvent, SessionOptions,
    SessionView, StudyController, StudyFetcher, StudySnapshot, UserAction, spawn_session,
};
use studysync_types::{
    Chapter, ChapterFeatures, ChapterSetup, Member, Node, Path, Position, Role, Study,
    StudyFeatures, StudyId, StudySettings, UserId, Visibility,
};

fn snapshot(path: &str) -> StudySnapshot {
    StudySnapshot {
        study: Study {
            id: "s1".into(),
            name: "Study".into(),
            owner_id: "ana".into(),
            visibility: Visibility::Public,
            position: Position::new("c1", path),
            features: StudyFeatures::default(),
            settings: StudySettings::default(),
            chapter: Chapter {
                id: "c1".into(),
                name: "One".into(),
                owner_id: "ana".into(),
                setup: ChapterSetup::default(),
                features: ChapterFeatures::default(),
                practice: false,
                conceal: None,
                tags: vec![],
            },
            chapters: vec![],
            members: [(UserId::from("ana"), Member::new("ana", Role::Write))]
                .into_iter()
                .collect(),
            likes: 0,
            liked: false,
        },
        tree: Node::new("", 0).with_child(Node::new("A", 1).with_child(Node::new("B", 2))),
    }
}

/// Serves a fixed snapshot and counts requests.
struct CountingFetcher {
    snapshot: StudySnapshot,
    calls: AtomicUsize,
}

#[async_trait]
impl StudyFetcher for CountingFetcher {
    async fn fetch(
        &self,
        _study: &StudyId,
        _req: &ReloadRequest,
    ) -> Result<StudySnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.clone())
    }
}

struct FailingFetcher;

#[async_trait]
impl StudyFetcher for FailingFetcher {
    async fn fetch(
        &self,
        _study: &StudyId,
        _req: &ReloadRequest,
    ) -> Result<StudySnapshot, FetchError> {
        Err(FetchError::Transport("connection reset".into()))
    }
}

fn controller() -> StudyController {
    StudyController::new(
        snapshot(""),
        SessionOptions::new("me").with_user("ana"),
        &ClientConfig::default(),
    )
}

async fn wait_for(
    rx: &mut tokio::sync::watch::Receiver<SessionView>,
    pred: impl Fn(&SessionView) -> bool,
) -> SessionView {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| pred(v)))
        .await
        .expect("timed out waiting for view")
        .expect("session dropped")
        .clone()
}

#[tokio::test]
async fn test_frames_update_published_view() {
    let (tx, _sent) = mpsc::unbounded_channel::<String>();
    let fetcher = Arc::new(CountingFetcher {
        snapshot: snapshot(""),
        calls: AtomicUsize::new(0),
    });
    let handle = spawn_session(controller(), tx, fetcher, &ClientConfig::default());
    let mut view = handle.watch();

    let frame = ServerEvent::Path {
        position: Position::new("c1", "AB"),
        who: None,
    }
    .to_frame()
    .unwrap();
    handle.push_frame(frame).await.unwrap();

    let v = wait_for(&mut view, |v| v.path == Path::from("AB")).await;
    assert_eq!(v.position.path, Path::from("AB"));
    assert_eq!(v.follow, FollowMode::Sticky);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_user_action_sends_frame() {
    let (tx, mut sent) = mpsc::unbounded_channel::<String>();
    let fetcher = Arc::new(CountingFetcher {
        snapshot: snapshot(""),
        calls: AtomicUsize::new(0),
    });
    let handle = spawn_session(controller(), tx, fetcher, &ClientConfig::default());

    handle
        .act(UserAction::Promote {
            path: Path::from("AB"),
            to_mainline: true,
        })
        .await
        .unwrap();
    let frame = tokio::time::timeout(Duration::from_secs(5), sent.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(frame.starts_with(r#"{"t":"promote""#));
    assert!(frame.contains(r#""toMainline":true"#));
}

#[tokio::test]
async fn test_divergence_reload_runs_through_fetcher() {
    let (tx, _sent) = mpsc::unbounded_channel::<String>();
    let fetcher = Arc::new(CountingFetcher {
        snapshot: snapshot("A"),
        calls: AtomicUsize::new(0),
    });
    let handle = spawn_session(controller(), tx, fetcher.clone(), &ClientConfig::default());
    let mut notices = handle.subscribe_notices();
    let mut view = handle.watch();

    handle
        .push_frame(r#"{"t":"path","d":{"p":{"chapterId":"c1","path":"AZ"}}}"#)
        .await
        .unwrap();

    let v = wait_for(&mut view, |v| !v.loading && v.position.path == Path::from("A")).await;
    assert_eq!(v.path, Path::from("A"));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

    let mut saw_full_redraw = false;
    while let Ok(effect) = notices.try_recv() {
        if effect == Effect::Redraw(studysync_client::Redraw::Full) {
            saw_full_redraw = true;
        }
    }
    assert!(saw_full_redraw);
}

#[tokio::test]
async fn test_failed_reload_clears_loading() {
    let (tx, _sent) = mpsc::unbounded_channel::<String>();
    let handle = spawn_session(controller(), tx, Arc::new(FailingFetcher), &ClientConfig::default());
    let mut view = handle.watch();

    handle.push_frame(r#"{"t":"reload"}"#).await.unwrap();
    // Queued behind the reload request, so seeing write off means the
    // request has been made.
    handle.act(UserAction::ToggleWrite).await.unwrap();
    let v = wait_for(&mut view, |v| !v.write && !v.loading).await;
    assert_eq!(v.position.path, Path::root());
    assert!(v.follow.is_sticky());
}

#[tokio::test]
async fn test_garbage_frames_do_not_kill_session() {
    let (tx, _sent) = mpsc::unbounded_channel::<String>();
    let fetcher = Arc::new(CountingFetcher {
        snapshot: snapshot(""),
        calls: AtomicUsize::new(0),
    });
    let handle = spawn_session(controller(), tx, fetcher, &ClientConfig::default());
    let mut view = handle.watch();

    handle.push_frame("not json").await.unwrap();
    handle.act(UserAction::Unstick).await.unwrap();
    let v = wait_for(&mut view, |v| !v.follow.is_sticky()).await;
    assert!(v.follow.pinned_chapter().is_some());
}

#[tokio::test]
async fn test_handle_errors_after_shutdown() {
    let (tx, _sent) = mpsc::unbounded_channel::<String>();
    let handle = spawn_session(controller(), tx, Arc::new(FailingFetcher), &ClientConfig::default());
    handle.shutdown().await.unwrap();

    let mut result = Ok(());
    for _ in 0..50 {
        result = handle.act(UserAction::ToggleWrite).await;
        if result.is_err() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(result.is_err());
}
