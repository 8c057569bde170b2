//! Task runner: one loop per worker, draining the shared queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::engine::{self, priority, EngineConfig, EngineLine};
use crate::progress;
use crate::task::{Task, TaskOutcome, TaskState};

use super::control::RunControl;

/// How often a held worker re-checks the pause flag.
pub(crate) const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) type TaskQueue = Arc<Mutex<mpsc::Receiver<Arc<Task>>>>;

/// Pulls tasks until the queue is drained. No retries here.
pub(crate) async fn run_worker(
    worker: usize,
    queue: TaskQueue,
    control: Arc<RunControl>,
    engine: Arc<EngineConfig>,
) {
    tracing::debug!(worker, "worker started");
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };
        run_task(&task, &control, &engine).await;
    }
    tracing::debug!(worker, "worker finished");
}

/// Runs one task to a terminal state.
pub(crate) async fn run_task(task: &Task, control: &RunControl, engine: &EngineConfig) {
    if !hold_while_paused(task, control).await {
        task.lock().cancel_unstarted();
        return;
    }

    let (index, url, output) = {
        let status = task.lock();
        (status.index(), status.url().to_string(), status.output().clone())
    };

    let mut process = match engine::spawn(engine, &url, &output) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(task = index, "{}", e);
            task.lock().fail_to_start(e);
            return;
        }
    };

    {
        let mut status = task.lock();
        if status.mark_started(process.process_ref()) && control.is_paused() {
            // Pause was toggled between the hold check and the spawn.
            let throttle = status.apply_pause(true);
            if throttle.is_some() {
                priority::pause(throttle);
            }
        }
    }

    let token = task.cancel_token();
    let mut detail: Option<String> = None;
    let outcome = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                task.lock().detach_process();
                process.terminate().await;
                break TaskOutcome::Cancelled;
            }
            line = process.next_line() => match line {
                Some(line) => match progress::parse_line(line.text()) {
                    Some(event) => progress::apply(&mut task.lock(), event),
                    None => {
                        if let EngineLine::Log(text) = line {
                            if !text.trim().is_empty() {
                                detail = Some(text.trim().to_string());
                            }
                        }
                    }
                },
                None => {
                    task.lock().detach_process();
                    let status = tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            process.terminate().await;
                            break TaskOutcome::Cancelled;
                        }
                        status = process.wait() => status,
                    };
                    break engine::classify_exit(status, token.is_cancelled(), detail.take());
                }
            },
        }
    };

    let mut status = task.lock();
    status.finish(outcome);
    match status.state() {
        TaskState::Failed => tracing::warn!(
            task = index,
            error = %status.error().map(|e| e.to_string()).unwrap_or_default(),
            "task failed"
        ),
        state => tracing::info!(task = index, state = state.as_str(), "task finished"),
    }
}

/// Keeps an unstarted task from launching while the pool is paused.
/// Returns false if the task was cancelled while waiting.
async fn hold_while_paused(task: &Task, control: &RunControl) -> bool {
    let token = task.cancel_token();
    loop {
        if token.is_cancelled() {
            return false;
        }
        if !control.is_paused() {
            return true;
        }
        task.lock().apply_pause(true);
        tokio::select! {
            _ = token.cancelled() => return false,
            _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => {}
        }
    }
}
