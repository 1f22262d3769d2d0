//! Replay recorded study broadcasts through a controller.
//!
//! Input is a recovery snapshot (the study as the client first loaded it) and
//! a JSON-lines log of socket frames. Frames are applied in order; reloads
//! the controller asks for are answered by a [`StudyFetcher`] before the next
//! frame, so a replay is deterministic.
//!
//! Blank lines and lines starting with `#` in the frame log are skipped.

use serde::Serialize;
use tracing::{debug, warn};

use studysync_client::{Effect, Outcome, SessionView, StudyController, StudyFetcher};

/// Tally of a replay run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub applied: usize,
    pub discarded: usize,
    pub recovering: usize,
    /// Frame types the client doesn't handle.
    pub unhandled: usize,
    /// Frames that failed to decode.
    pub malformed: usize,
    pub reloads: usize,
    pub failed_reloads: usize,
    /// Outbound frames the controller produced.
    pub sent: Vec<String>,
    /// Messages surfaced to the user.
    pub notices: Vec<String>,
    pub hard_reload: bool,
}

/// Apply every frame in `log`, answering reloads with `fetcher`.
pub async fn replay(
    ctrl: &mut StudyController,
    fetcher: &dyn StudyFetcher,
    log: &str,
) -> ReplayReport {
    let mut report = ReplayReport::default();
    for (lineno, line) in log.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        report.frames += 1;
        match ctrl.handle_frame(line) {
            Ok(Some(outcome)) => {
                debug!(line = lineno + 1, ?outcome, "frame replayed");
                match outcome {
                    Outcome::Applied => report.applied += 1,
                    Outcome::Discarded(_) => report.discarded += 1,
                    Outcome::Recovering => report.recovering += 1,
                }
            }
            Ok(None) => report.unhandled += 1,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "skipping malformed frame");
                report.malformed += 1;
            }
        }
        settle(ctrl, fetcher, &mut report).await;
    }
    report
}

/// Run effects until the controller is quiet.
async fn settle(ctrl: &mut StudyController, fetcher: &dyn StudyFetcher, report: &mut ReplayReport) {
    loop {
        let effects = ctrl.drain_effects();
        if effects.is_empty() {
            return;
        }
        for effect in effects {
            match effect {
                Effect::Send(change) => match change.to_frame() {
                    Ok(frame) => report.sent.push(frame),
                    Err(e) => warn!(kind = change.kind(), error = %e, "unencodable change"),
                },
                Effect::Reload(req) => {
                    report.reloads += 1;
                    let study = ctrl.study().id.clone();
                    match fetcher.fetch(&study, &req).await {
                        Ok(snapshot) => ctrl.apply_reload(snapshot),
                        Err(e) => {
                            report.failed_reloads += 1;
                            ctrl.reload_failed(&e);
                        }
                    }
                }
                Effect::Notify(message) => report.notices.push(message),
                Effect::HardReload => report.hard_reload = true,
                Effect::Redraw(_) | Effect::BoardShapes(_) | Effect::Features(_) => {}
            }
        }
    }
}

/// One-line human summary of where the session ended up.
pub fn describe(view: &SessionView) -> String {
    format!(
        "chapter={} position={}:{:?} view={:?} follow={:?} write={} loading={}",
        view.chapter_id,
        view.position.chapter_id,
        view.position.path.as_str(),
        view.path.as_str(),
        view.follow,
        view.write,
        view.loading,
    )
}
