//! Integration test: full runs against fake engine scripts.
//!
//! Each test writes a small `sh` script that speaks the engine's progress
//! protocol, runs the orchestrator over it with a headless dashboard, and
//! checks the final task records.

#![cfg(unix)]

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use m3ubatch_core::dashboard::{DashboardExit, DashboardOptions, KeyCommand, NoKeys, ScriptedKeys};
use m3ubatch_core::engine::EngineConfig;
use m3ubatch_core::scheduler::Orchestrator;
use m3ubatch_core::task::{Task, TaskState};
use tempfile::tempdir;

use common::fake_engine;

fn fast() -> DashboardOptions {
    DashboardOptions {
        tick: Duration::from_millis(20),
        exit_when_done: true,
        drain_limit: Duration::from_secs(5),
    }
}

fn orchestrator(engine: EngineConfig, parallel: usize) -> Orchestrator {
    Orchestrator::new(engine, parallel).with_dashboard_options(fast())
}

/// Samples task states until stopped; records the peak number downloading
/// and whether any task was ever seen paused.
fn spawn_monitor(
    tasks: Vec<Arc<Task>>,
    stop: Arc<AtomicBool>,
    peak: Arc<AtomicUsize>,
    saw_paused: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while !stop.load(Ordering::SeqCst) {
            let states: Vec<TaskState> = tasks.iter().map(|t| t.state()).collect();
            let active = states.iter().filter(|s| **s == TaskState::Downloading).count();
            peak.fetch_max(active, Ordering::SeqCst);
            if states.contains(&TaskState::Paused) {
                saw_paused.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_tasks_complete_at_full_progress() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::COMPLETES), 2);

    let tasks = orch.build_tasks(&fake_engine::links(3), out.path());
    let report = orch
        .run_tasks(tasks, NoKeys, std::io::sink())
        .await
        .expect("run");

    assert_eq!(report.exit, DashboardExit::Finished);
    assert_eq!(report.count(TaskState::Completed), 3);
    for t in &report.tasks {
        assert_eq!(t.progress(), 100.0, "{}", t.name());
        assert!(t.error().is_none());
        assert!(t.process().is_none());
        assert_eq!(t.duration(), Duration::from_secs(10));
        assert_eq!(t.size_bytes(), 1_048_576);
        assert!(t.output().exists(), "engine should have written {:?}", t.output());
    }
    assert_eq!(
        report.tasks[0].output(),
        &out.path().join("Episode 1.mp4")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn engine_failure_keeps_last_log_line() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::FAILS_404), 1);

    let tasks = orch.build_tasks(&fake_engine::links(1), out.path());
    let report = orch
        .run_tasks(tasks, NoKeys, std::io::sink())
        .await
        .expect("run");

    let t = &report.tasks[0];
    assert_eq!(t.state(), TaskState::Failed);
    assert!(t.progress() < 100.0);
    let message = t.error().expect("failure detail").to_string();
    assert!(message.contains("404"), "got {:?}", message);
    assert_eq!(report.failed().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_engine_fails_every_task_without_process() {
    let out = tempdir().unwrap();
    let engine = EngineConfig::new(out.path().join("no-such-engine"));
    let orch = orchestrator(engine, 2);

    let tasks = orch.build_tasks(&fake_engine::links(2), out.path());
    let report = orch
        .run_tasks(tasks, NoKeys, std::io::sink())
        .await
        .expect("run");

    assert_eq!(report.exit, DashboardExit::Finished);
    for t in &report.tasks {
        assert_eq!(t.state(), TaskState::Failed);
        assert!(t.process().is_none());
        assert!(!t.error().expect("spawn error").to_string().is_empty());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interrupt_cancels_running_and_queued_tasks() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::HANGS), 1);
    let control = orch.control();

    let tasks = orch.build_tasks(&fake_engine::links(3), out.path());
    let interrupter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        control.interrupt();
    });

    let started = Instant::now();
    let report = orch
        .run_tasks(tasks, NoKeys, std::io::sink())
        .await
        .expect("run");
    interrupter.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(10), "run should stop promptly");
    assert_eq!(report.exit, DashboardExit::Interrupted);
    assert!(report.stopped_early());
    assert_eq!(report.count(TaskState::Cancelled), 3);
    assert!(report.tasks.iter().all(|t| t.process().is_none()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quit_key_cancels_and_reports_quit() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::HANGS), 2);

    let tasks = orch.build_tasks(&fake_engine::links(2), out.path());
    let keys = ScriptedKeys::new([(Duration::from_millis(250), KeyCommand::Quit)]);
    let report = orch
        .run_tasks(tasks, keys, std::io::sink())
        .await
        .expect("run");

    assert_eq!(report.exit, DashboardExit::Quit);
    assert_eq!(report.count(TaskState::Cancelled), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_more_downloading_than_workers() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::SLOW), 2);

    let tasks = orch.build_tasks(&fake_engine::links(3), out.path());
    let stop = Arc::new(AtomicBool::new(false));
    let peak = Arc::new(AtomicUsize::new(0));
    let monitor = spawn_monitor(
        tasks.clone(),
        Arc::clone(&stop),
        Arc::clone(&peak),
        Arc::new(AtomicBool::new(false)),
    );

    let report = orch
        .run_tasks(tasks, NoKeys, std::io::sink())
        .await
        .expect("run");
    stop.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    assert_eq!(report.count(TaskState::Completed), 3);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak downloading {}", peak);
    assert!(peak >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pause_then_resume_still_completes() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let orch = orchestrator(fake_engine::engine(bin.path(), fake_engine::SLOW), 1);
    let control = orch.control();

    let tasks = orch.build_tasks(&fake_engine::links(2), out.path());
    let stop = Arc::new(AtomicBool::new(false));
    let saw_paused = Arc::new(AtomicBool::new(false));
    let monitor = spawn_monitor(
        tasks.clone(),
        Arc::clone(&stop),
        Arc::new(AtomicUsize::new(0)),
        Arc::clone(&saw_paused),
    );

    let keys = ScriptedKeys::new([
        (Duration::from_millis(150), KeyCommand::TogglePause),
        (Duration::from_millis(450), KeyCommand::TogglePause),
    ]);
    let report = orch
        .run_tasks(tasks, keys, std::io::sink())
        .await
        .expect("run");
    stop.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    assert!(saw_paused.load(Ordering::SeqCst), "a task should have shown paused");
    assert!(!control.is_paused());
    assert_eq!(report.exit, DashboardExit::Finished);
    assert_eq!(report.count(TaskState::Completed), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn paused_pool_does_not_start_queued_tasks() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let script = fake_engine::counting_starts(fake_engine::COMPLETES);
    let orch = orchestrator(fake_engine::engine(bin.path(), &script), 1);

    let tasks = orch.build_tasks(&fake_engine::links(2), out.path());
    let watched = tasks.clone();
    let bin_path = bin.path().to_path_buf();
    // The first task finishes during the pause; the second must wait for resume.
    let checkpoint = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(900)).await;
        (
            watched[0].snapshot(),
            watched[1].snapshot(),
            fake_engine::starts(&bin_path),
        )
    });

    let keys = ScriptedKeys::new([
        (Duration::from_millis(100), KeyCommand::TogglePause),
        (Duration::from_millis(1300), KeyCommand::TogglePause),
    ]);
    let report = orch
        .run_tasks(tasks, keys, std::io::sink())
        .await
        .expect("run");
    let (first, second, starts_while_paused) = checkpoint.await.unwrap();

    assert_eq!(first.state(), TaskState::Completed);
    assert_eq!(second.state(), TaskState::Paused);
    assert!(second.process().is_none());
    assert_eq!(starts_while_paused, 1);

    assert_eq!(report.count(TaskState::Completed), 2);
    assert_eq!(fake_engine::starts(bin.path()), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quit_while_paused_before_start_cancels_without_spawning() {
    let bin = tempdir().unwrap();
    let out = tempdir().unwrap();
    let script = fake_engine::counting_starts(fake_engine::COMPLETES);
    let orch = orchestrator(fake_engine::engine(bin.path(), &script), 2);
    assert!(orch.control().toggle_pause());

    let tasks = orch.build_tasks(&fake_engine::links(2), out.path());
    let keys = ScriptedKeys::new([(Duration::from_millis(300), KeyCommand::Quit)]);
    let report = orch
        .run_tasks(tasks, keys, std::io::sink())
        .await
        .expect("run");

    assert_eq!(report.exit, DashboardExit::Quit);
    assert_eq!(report.count(TaskState::Cancelled), 2);
    assert!(report.tasks.iter().all(|t| t.process().is_none()));
    assert_eq!(fake_engine::starts(bin.path()), 0);
}
