//! Orchestrator: fixed worker pool over a closed task queue, plus the
//! dashboard loop on its own thread.
//!
//! Workers and the dashboard share only the per-task records and the run
//! control (pause flag + interrupt). When the dashboard exits, every task's
//! signal is cancelled and the run waits for all workers to finish.

mod control;
mod runner;

pub use control::{spawn_interrupt_listener, toggle_pause, RunControl};

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::dashboard::{Dashboard, DashboardExit, DashboardOptions, KeySource};
use crate::engine::EngineConfig;
use crate::output_path;
use crate::task::{LinkDescriptor, Task, TaskState, TaskStatus};

/// Final state of a run, in playlist order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub tasks: Vec<TaskStatus>,
    pub exit: DashboardExit,
}

impl RunReport {
    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state() == state).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskStatus> {
        self.tasks
            .iter()
            .filter(|t| t.state() == TaskState::Failed)
    }

    /// True if the user quit or the process was interrupted.
    pub fn stopped_early(&self) -> bool {
        !matches!(self.exit, DashboardExit::Finished)
    }
}

pub struct Orchestrator {
    engine: Arc<EngineConfig>,
    parallel: usize,
    control: Arc<RunControl>,
    dashboard: DashboardOptions,
}

impl Orchestrator {
    pub fn new(engine: EngineConfig, parallel: usize) -> Self {
        Self {
            engine: Arc::new(engine),
            parallel: parallel.max(1),
            control: Arc::new(RunControl::new()),
            dashboard: DashboardOptions::default(),
        }
    }

    pub fn with_dashboard_options(mut self, options: DashboardOptions) -> Self {
        self.dashboard = options;
        self
    }

    /// Run control for this orchestrator; hook interrupts to it before running.
    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    /// One task per link, in order, each with its own signal and a resolved output path.
    pub fn build_tasks(&self, links: &[LinkDescriptor], output_dir: &Path) -> Vec<Arc<Task>> {
        let outputs = output_path::resolve_output_paths(links, output_dir);
        self.tasks_for(links.iter().cloned().zip(outputs))
    }

    /// Like `build_tasks` for links whose output paths are already resolved.
    pub fn tasks_for(
        &self,
        entries: impl IntoIterator<Item = (LinkDescriptor, PathBuf)>,
    ) -> Vec<Arc<Task>> {
        entries
            .into_iter()
            .enumerate()
            .map(|(index, (link, output))| {
                let status = TaskStatus::new(index, link, output);
                Arc::new(Task::new(status, self.control.task_token()))
            })
            .collect()
    }

    pub async fn run<K, W>(
        &self,
        links: &[LinkDescriptor],
        output_dir: &Path,
        keys: K,
        out: W,
    ) -> Result<RunReport>
    where
        K: KeySource + Send + 'static,
        W: Write + Send + 'static,
    {
        let tasks = self.build_tasks(links, output_dir);
        self.run_tasks(tasks, keys, out).await
    }

    /// Drives prepared tasks to terminal states. Blocks until the dashboard
    /// exits and every worker has drained.
    pub async fn run_tasks<K, W>(&self, tasks: Vec<Arc<Task>>, keys: K, out: W) -> Result<RunReport>
    where
        K: KeySource + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(tasks.len().max(1));
        for task in &tasks {
            tx.try_send(Arc::clone(task))
                .map_err(|e| anyhow::anyhow!("fill task queue: {}", e))?;
        }
        drop(tx);
        let queue: runner::TaskQueue = Arc::new(Mutex::new(rx));

        tracing::info!(tasks = tasks.len(), workers = self.parallel, "run started");
        let mut workers = tokio::task::JoinSet::new();
        for worker in 0..self.parallel {
            workers.spawn(runner::run_worker(
                worker,
                Arc::clone(&queue),
                Arc::clone(&self.control),
                Arc::clone(&self.engine),
            ));
        }

        let dashboard = Dashboard::new(
            tasks.clone(),
            Arc::clone(&self.control),
            keys,
            out,
            self.dashboard.clone(),
        );
        let exit = tokio::task::spawn_blocking(move || dashboard.run()).await;

        for task in &tasks {
            task.cancel();
        }
        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                tracing::error!("worker task join: {}", e);
            }
        }
        // Tasks a panicked worker never reached.
        for task in &tasks {
            task.lock().cancel_unstarted();
        }

        let exit = exit.context("dashboard thread join")??;
        tracing::info!(?exit, "run finished");
        Ok(RunReport {
            tasks: tasks.iter().map(|t| t.snapshot()).collect(),
            exit,
        })
    }
}
