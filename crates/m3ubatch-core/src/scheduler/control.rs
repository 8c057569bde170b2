//! Run-wide control: the shared pause flag and the interrupt signal.
//!
//! Each task's cancellation token is a child of the run token, so an interrupt
//! reaches every task exactly once while tasks can still be cancelled alone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::priority;
use crate::task::Task;

#[derive(Debug, Default)]
pub struct RunControl {
    paused: AtomicBool,
    interrupt: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Flips the pause flag and returns the new value. Only the dashboard writes it.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }

    /// A fresh per-task signal tied to this run.
    pub fn task_token(&self) -> CancellationToken {
        self.interrupt.child_token()
    }

    /// Process-wide interrupt: ends the dashboard and cancels every task.
    pub fn interrupt(&self) {
        if !self.interrupt.is_cancelled() {
            tracing::info!("interrupt requested; cancelling all tasks");
        }
        self.interrupt.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }
}

/// Toggles the pool-wide pause and applies it to every task right away.
/// Returns the new paused value.
pub fn toggle_pause(tasks: &[Arc<Task>], control: &RunControl) -> bool {
    let paused = control.toggle_pause();
    tracing::info!(paused, "pause toggled");
    for task in tasks {
        // The lock is held across the priority call: the runner detaches the
        // pid under it before reaping, so the pid cannot be recycled meanwhile.
        let mut status = task.lock();
        let process = status.apply_pause(paused);
        if process.is_some() {
            if paused {
                priority::pause(process);
            } else {
                priority::resume(process);
            }
        }
    }
    paused
}

/// Listens for Ctrl-C / SIGTERM and interrupts the run. Abort the handle when
/// the run ends.
pub fn spawn_interrupt_listener(control: Arc<RunControl>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;
        control.interrupt();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            return;
        }
    };
    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                tracing::warn!("Ctrl-C handler: {}", e);
                term.recv().await;
            }
        }
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
