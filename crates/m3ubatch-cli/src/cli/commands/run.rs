//! `m3ubatch run` – download a playlist with the dashboard, then retry failures.

use anyhow::{Context, Result};
use m3ubatch_core::config::{self, Settings};
use m3ubatch_core::dashboard::{DashboardOptions, TerminalGuard, TerminalKeys};
use m3ubatch_core::engine::{self, EngineConfig};
use m3ubatch_core::existing::{self, ExistingOutput};
use m3ubatch_core::output_path;
use m3ubatch_core::playlist;
use m3ubatch_core::scheduler::{spawn_interrupt_listener, Orchestrator, RunReport};
use m3ubatch_core::task::{LinkDescriptor, TaskState, TaskStatus};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub playlist: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub parallel: Option<usize>,
    pub speed_limit: Option<String>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub overwrite: bool,
    pub stay: bool,
}

/// Flags override saved settings for this run only.
pub(crate) fn apply_overrides(mut cfg: Settings, args: &RunArgs) -> Result<Settings> {
    if let Some(n) = args.parallel {
        cfg.parallel_downloads = n;
    }
    if let Some(raw) = &args.speed_limit {
        cfg.speed_limit = config::parse_speed_limit(raw)?;
    }
    if let Some(secs) = args.timeout {
        cfg.timeout_secs = secs;
    }
    if let Some(n) = args.retries {
        cfg.retries = n;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// `<dir>/<playlist stem>` next to the playlist.
pub(crate) fn default_output_dir(playlist: &Path) -> PathBuf {
    let stem = playlist
        .file_stem()
        .map(|s| output_path::sanitize_file_stem(&s.to_string_lossy()))
        .unwrap_or_else(|| output_path::DEFAULT_STEM.to_string());
    playlist
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(stem)
}

pub async fn run_batch(cfg: Settings, args: RunArgs) -> Result<()> {
    let cfg = apply_overrides(cfg, &args)?;
    let engine_cfg = EngineConfig::from_settings(&cfg);
    engine::check_available(&engine_cfg.program).await?;

    let links = playlist::parse_m3u(&args.playlist)?;
    if links.is_empty() {
        println!("No links found in {}.", args.playlist.display());
        return Ok(());
    }
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(&args.playlist));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("create output dir {}", output_dir.display()))?;

    let outputs = output_path::resolve_output_paths(&links, &output_dir);
    let entries: Vec<(LinkDescriptor, PathBuf)> = links.into_iter().zip(outputs).collect();
    let skipped = if args.overwrite {
        Vec::new()
    } else {
        let paths: Vec<PathBuf> = entries.iter().map(|(_, p)| p.clone()).collect();
        existing::find_existing(Path::new(&cfg.ffprobe_path), &paths).await
    };
    let pending = existing::without_existing(&entries, &skipped);
    tracing::info!(
        playlist = %args.playlist.display(),
        total = entries.len(),
        skipped = skipped.len(),
        "starting batch"
    );

    let options = DashboardOptions {
        exit_when_done: !args.stay,
        ..DashboardOptions::default()
    };
    let finals = if pending.is_empty() {
        Vec::new()
    } else {
        let guard = TerminalGuard::enter().context("enter dashboard terminal")?;
        let finals = run_rounds(&engine_cfg, &cfg, options, pending).await;
        drop(guard);
        finals?
    };

    print_summary(&finals, &skipped);
    Ok(())
}

/// First run plus up to `retries` rounds for failed tasks. Stops retrying
/// once a round was interrupted, quit or had cancelled tasks.
async fn run_rounds(
    engine_cfg: &EngineConfig,
    cfg: &Settings,
    options: DashboardOptions,
    pending: Vec<(LinkDescriptor, PathBuf)>,
) -> Result<Vec<TaskStatus>> {
    let mut finals: Vec<TaskStatus> = Vec::new();
    // Index into `finals` for each entry of the current round.
    let mut slots: Vec<Option<usize>> = vec![None; pending.len()];
    let mut round_entries = pending;

    for round in 0..=cfg.retries {
        if round > 0 {
            tracing::info!(round, failed = round_entries.len(), "retrying failed downloads");
        }
        let report = run_round(
            engine_cfg,
            cfg.parallel_downloads,
            options.clone(),
            &round_entries,
        )
        .await?;

        let mut retry = Vec::new();
        let mut retry_slots = Vec::new();
        for (status, slot) in report.tasks.iter().zip(&slots) {
            let slot = match slot {
                Some(i) => {
                    finals[*i] = status.clone();
                    *i
                }
                None => {
                    finals.push(status.clone());
                    finals.len() - 1
                }
            };
            if status.state() == TaskState::Failed {
                retry.push((status.link().clone(), status.output().clone()));
                retry_slots.push(Some(slot));
            }
        }

        if retry.is_empty() || stops_retries(&report) {
            break;
        }
        round_entries = retry;
        slots = retry_slots;
    }
    Ok(finals)
}

async fn run_round(
    engine_cfg: &EngineConfig,
    parallel: usize,
    options: DashboardOptions,
    entries: &[(LinkDescriptor, PathBuf)],
) -> Result<RunReport> {
    let orch = Orchestrator::new(engine_cfg.clone(), parallel).with_dashboard_options(options);
    let tasks = orch.tasks_for(entries.iter().cloned());
    let listener = spawn_interrupt_listener(orch.control());
    let report = orch.run_tasks(tasks, TerminalKeys, std::io::stdout()).await;
    listener.abort();
    report
}

pub(crate) fn stops_retries(report: &RunReport) -> bool {
    report.stopped_early() || report.count(TaskState::Cancelled) > 0
}

fn print_summary(finals: &[TaskStatus], skipped: &[ExistingOutput]) {
    let count = |state: TaskState| finals.iter().filter(|t| t.state() == state).count();
    println!(
        "{} completed, {} failed, {} cancelled, {} skipped",
        count(TaskState::Completed),
        count(TaskState::Failed),
        count(TaskState::Cancelled),
        skipped.len()
    );
    for s in skipped {
        println!("  skipped {} (already present)", s.path.display());
    }
    for t in finals.iter().filter(|t| t.state() == TaskState::Failed) {
        let reason = t
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        println!("  failed  {}: {}", t.name(), reason);
    }
}
