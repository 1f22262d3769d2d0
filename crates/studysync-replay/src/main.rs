//! studysync replay binary.
//!
//! Feeds a recorded frame log through the reconciliation engine and prints
//! where the client ends up.
//!
//! Usage:
//!   cargo run -p studysync-replay -- --snapshot study.json --frames socket.jsonl
//!
//!   # As a particular user and socket session, to see own echoes handled
//!   cargo run -p studysync-replay -- --snapshot study.json --frames socket.jsonl \
//!       --user ana --session sri42

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use studysync_client::{ClientConfig, SessionOptions, SnapshotFetcher, StudyController};
use studysync_replay::{describe, replay};

/// Replay study broadcasts through the client reconciliation engine.
#[derive(Parser, Debug)]
#[command(name = "studysync-replay")]
#[command(about = "Replay recorded study broadcasts")]
struct Args {
    /// Recovery snapshot JSON the client starts from (also serves reloads)
    #[arg(long)]
    snapshot: PathBuf,

    /// JSON-lines file of inbound socket frames
    #[arg(long)]
    frames: PathBuf,

    /// Local socket session id
    #[arg(long, default_value = "replay")]
    session: String,

    /// Local user id (omit for an anonymous viewer)
    #[arg(long)]
    user: Option<String>,

    /// Deep-linked starting path
    #[arg(long)]
    path: Option<String>,

    /// Practice session
    #[arg(long)]
    practice: bool,

    /// Client config (RON)
    #[arg(long, default_value = "studysync.ron")]
    config: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ClientConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let snapshot = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading {}", args.snapshot.display()))?;
    let fetcher = SnapshotFetcher::from_json(&snapshot).context("parsing snapshot")?;
    let log = std::fs::read_to_string(&args.frames)
        .with_context(|| format!("reading {}", args.frames.display()))?;

    let mut opts = SessionOptions::new(args.session.as_str()).with_practice(args.practice);
    if let Some(user) = args.user.as_deref() {
        opts = opts.with_user(user);
    }
    if let Some(path) = args.path.as_deref() {
        opts = opts.with_initial_path(path);
    }

    let mut ctrl: StudyController = StudyController::new(fetcher.snapshot().clone(), opts, &config);
    tracing::info!(study = %ctrl.study().id, "replaying {}", args.frames.display());

    let report = replay(&mut ctrl, &fetcher, &log).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "frames={} applied={} discarded={} recovering={} unhandled={} malformed={} reloads={}",
            report.frames,
            report.applied,
            report.discarded,
            report.recovering,
            report.unhandled,
            report.malformed,
            report.reloads,
        );
        for frame in &report.sent {
            println!("sent {frame}");
        }
        for notice in &report.notices {
            println!("notice {notice}");
        }
        if report.hard_reload {
            println!("hard reload requested");
        }
    }
    println!("{}", describe(&ctrl.view_snapshot()));
    Ok(())
}
