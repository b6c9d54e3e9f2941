// formguard/src/main.rs
//
// FormGuard: abuse detection and lead scoring for inbound form submissions
//
// Three operational modes:
//   tail     follow a growing JSONL file of raw submissions (staging / sidecar)
//   replay   replay a captured file at scaled speed, restamping submit times
//   eval     run the classifier over a labelled dataset and print a report
//
// Usage:
//   formguard --mode tail --path /var/log/forms/submissions.jsonl
//   formguard --mode replay --path captured.jsonl --speed 10.0
//   formguard --mode eval --path labelled.jsonl --report json

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use formguard::engine::dispatcher::Dispatcher;
use formguard::eval::{report, Evaluator};
use formguard::state::window::now_ms;
use formguard::{Config, Pipeline, RawSubmission, SpamClassifier};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name    = "formguard",
    about   = "Abuse detection and lead scoring for inbound form submissions",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    #[arg(long, value_enum, default_value = "tail")]
    mode: Mode,

    #[arg(long, default_value = "/tmp/formguard_submissions.jsonl",
          help = "JSONL input path")]
    path: PathBuf,

    #[arg(long, default_value = "1.0", help = "Replay speed multiplier")]
    speed: f64,

    #[arg(long, env = "FORMGUARD_OUTPUT_DIR", default_value = "/tmp/formguard_output",
          help = "Decision output directory")]
    output: PathBuf,

    #[arg(long, value_enum, default_value = "markdown", help = "Eval report format")]
    report: ReportFormat,

    #[arg(long, env = "FORMGUARD_METRICS_FILE",
          help = "Write Prometheus text metrics here on every stats tick")]
    metrics_file: Option<PathBuf>,

    #[arg(long, default_value = "30", help = "Seconds between stats ticks")]
    stats_interval: u64,

    // Overrides for the FORMGUARD_* environment configuration.
    #[arg(long)]
    window_ms: Option<u64>,
    #[arg(long)]
    max_requests: Option<u32>,
    #[arg(long)]
    min_completion_ms: Option<i64>,
    #[arg(long)]
    max_completion_ms: Option<i64>,
}

#[derive(Clone, ValueEnum)]
enum Mode {
    Tail,    // follow a live JSONL file
    Replay,  // replay a static JSONL file at scaled speed
    Eval,    // labelled-dataset classifier evaluation
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut cfg = Config::from_env()?;
        if let Some(v) = self.window_ms         { cfg.rate_limit.window_ms = v; }
        if let Some(v) = self.max_requests      { cfg.rate_limit.max_requests = v; }
        if let Some(v) = self.min_completion_ms { cfg.classifier.min_completion_ms = v; }
        if let Some(v) = self.max_completion_ms { cfg.classifier.max_completion_ms = v; }
        cfg.validate()?;
        Ok(cfg)
    }
}

// ── Stats ────────────────────────────────────────────────────────────────────

async fn stats_loop(pipeline: Arc<Pipeline>, every: Duration, metrics_file: Option<PathBuf>, start: Instant) {
    use std::sync::atomic::Ordering::Relaxed;
    loop {
        tokio::time::sleep(every).await;
        let m = pipeline.metrics();
        let processed = m.submissions.load(Relaxed);
        let elapsed = start.elapsed().as_secs_f64();
        info!(
            uptime_secs = elapsed as u64,
            processed,
            per_sec = processed as f64 / elapsed,
            accepted = m.accepted.load(Relaxed),
            rate_limited = m.rate_limited.load(Relaxed),
            spam_suppressed = m.spam_suppressed.load(Relaxed),
            identifiers = pipeline.limiter().n_identifiers(),
            "stats"
        );
        if let Some(path) = &metrics_file {
            let body = m.render_prometheus(pipeline.limiter().n_identifiers(), pipeline.limiter().store_errors());
            if let Err(e) = tokio::fs::write(path, body).await {
                warn!(path = %path.display(), error = %e, "metrics write failed");
            }
        }
    }
}

// ── Submission sources ───────────────────────────────────────────────────────

async fn tail_jsonl(path: PathBuf, tx: mpsc::Sender<RawSubmission>) -> Result<()> {
    let file = tokio::fs::File::open(&path).await?;
    let mut lines = BufReader::new(file).lines();

    while lines.next_line().await?.is_some() {}  // skip the backlog

    info!(path = %path.display(), "tailing");
    loop {
        match lines.next_line().await? {
            Some(line) => {
                let line = line.trim();
                if line.is_empty() { continue; }
                match serde_json::from_str::<RawSubmission>(line) {
                    Ok(raw) => { if tx.send(raw).await.is_err() { break; } }
                    Err(e) => warn!(error = %e, "submission parse error"),
                }
            }
            None => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
    Ok(())
}

async fn replay_jsonl(path: PathBuf, tx: mpsc::Sender<RawSubmission>, speed: f64) -> Result<()> {
    let content = tokio::fs::read_to_string(&path).await?;
    let mut subs: Vec<(i64, RawSubmission)> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() { continue; }
        match serde_json::from_str::<RawSubmission>(line) {
            Ok(raw) => subs.push((epoch(&raw.timestamp).unwrap_or(0), raw)),
            Err(e) => warn!(error = %e, "submission parse error"),
        }
    }

    if subs.is_empty() { return Ok(()); }
    subs.sort_by_key(|(ts, _)| *ts);
    info!(submissions = subs.len(), speed, path = %path.display(), "replaying");

    let base_ts   = subs[0].0;
    let base_wall = Instant::now();
    let speed     = if speed > 0.0 { speed } else { 1.0 };

    for (ts, mut raw) in subs {
        let offset = (ts - base_ts).max(0) as f64 / speed / 1000.0;
        let target = base_wall + Duration::from_secs_f64(offset);
        let now    = Instant::now();
        if target > now {
            tokio::time::sleep(target - now).await;
        }
        restamp(&mut raw, now_ms());
        if tx.send(raw).await.is_err() { break; }
    }
    Ok(())
}

/// Move the submit time to `now`, keeping the recorded fill-in duration.
fn restamp(raw: &mut RawSubmission, now: i64) {
    let Some(submitted) = epoch(&raw.timestamp) else { return };
    if let Some(started) = epoch(&raw.form_start_time) {
        raw.form_start_time = Value::from(now.saturating_sub(submitted.saturating_sub(started)));
    }
    raw.timestamp = Value::from(now);
}

fn epoch(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env()
            .add_directive("formguard=info".parse()?))
        .compact().init();

    let cli = Cli::parse();
    let cfg = cli.config()?;

    match cli.mode {
        Mode::Eval => run_eval(&cli, &cfg).await,
        Mode::Tail | Mode::Replay => run_stream(&cli, &cfg).await,
    }
}

async fn run_eval(cli: &Cli, cfg: &Config) -> Result<()> {
    let result = Evaluator::new(SpamClassifier::new(cfg.classifier))
        .run_dataset(&cli.path).await?;
    match cli.report {
        ReportFormat::Markdown => print!("{}", report::markdown(&result)),
        ReportFormat::Json     => println!("{}", report::to_json(&result)),
    }
    Ok(())
}

async fn run_stream(cli: &Cli, cfg: &Config) -> Result<()> {
    let pipeline   = Arc::new(Pipeline::new(cfg));
    let dispatcher = Arc::new(Dispatcher::new(cli.output.clone())?);
    let start      = Instant::now();
    let (tx, mut rx) = mpsc::channel::<RawSubmission>(16384);

    info!(
        window_ms = cfg.rate_limit.window_ms,
        max_requests = cfg.rate_limit.max_requests,
        min_completion_ms = cfg.classifier.min_completion_ms,
        max_completion_ms = cfg.classifier.max_completion_ms,
        output = %cli.output.display(),
        "formguard starting"
    );

    tokio::spawn(stats_loop(
        Arc::clone(&pipeline),
        Duration::from_secs(cli.stats_interval.max(1)),
        cli.metrics_file.clone(),
        start,
    ));
    tokio::spawn(Arc::clone(pipeline.limiter())
        .housekeeping_loop(Duration::from_secs(cfg.housekeeping_interval_secs)));

    let path = cli.path.clone();
    let source = if let Mode::Replay = cli.mode {
        tokio::spawn(replay_jsonl(path, tx, cli.speed))
    } else {
        tokio::spawn(tail_jsonl(path, tx))
    };

    // One task per submission; drain in-flight work once the source ends.
    let mut inflight = JoinSet::new();
    while let Some(raw) = rx.recv().await {
        let p = Arc::clone(&pipeline);
        let d = Arc::clone(&dispatcher);
        inflight.spawn(async move {
            let decision = p.process(raw).await;
            if let Err(e) = d.dispatch(&decision).await {
                error!(error = %e, "dispatch failed");
            }
        });
        while inflight.try_join_next().is_some() {}
    }
    while inflight.join_next().await.is_some() {}

    if let Err(e) = source.await? {
        error!(error = %e, "submission source failed");
    }
    info!(processed = pipeline.metrics().submissions.load(std::sync::atomic::Ordering::Relaxed), "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restamp_keeps_fill_duration() {
        let mut raw = RawSubmission {
            timestamp:       Value::from(1_000_000),
            form_start_time: Value::from(955_000),
            ..Default::default()
        };
        restamp(&mut raw, 5_000_000);
        assert_eq!(raw.timestamp, Value::from(5_000_000));
        assert_eq!(raw.form_start_time, Value::from(4_955_000));
    }

    #[test]
    fn restamp_survives_extreme_timestamps() {
        let mut raw = RawSubmission {
            timestamp:       Value::from(i64::MAX),
            form_start_time: Value::from(i64::MIN),
            ..Default::default()
        };
        restamp(&mut raw, 5_000_000);
        assert_eq!(raw.timestamp, Value::from(5_000_000));
        assert_eq!(raw.form_start_time, Value::from(5_000_000 - i64::MAX));
    }

    #[test]
    fn restamp_leaves_missing_times_alone() {
        let mut raw = RawSubmission::default();
        restamp(&mut raw, 5_000_000);
        assert_eq!(raw.timestamp, Value::Null);
    }

    #[test]
    fn cli_overrides_env_config() {
        let cli = Cli::parse_from(["formguard", "--mode", "eval", "--max-requests", "9"]);
        assert_eq!(cli.config().unwrap().rate_limit.max_requests, 9);
    }
}
