//! Task model: one immutable link descriptor plus the mutable status record
//! shared between the worker that owns the task and the dashboard.
//!
//! Every mutation goes through `TaskStatus` methods so the lifecycle rules hold:
//! terminal states are final, the process reference only exists while the task
//! is Downloading or Paused, and progress never moves backwards.

mod error;

pub use error::TaskError;

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Progress is held just below 100 until the engine confirms success.
const MAX_ACTIVE_PROGRESS: f64 = 99.9;

/// One playlist entry: display name and source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDescriptor {
    pub name: String,
    pub url: String,
}

impl LinkDescriptor {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Queued,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "Queued",
            TaskState::Downloading => "Downloading",
            TaskState::Paused => "Paused",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
            TaskState::Cancelled => "Cancelled",
        }
    }
}

/// Control-only reference to a live engine process. The OS owns the process;
/// this is used solely to adjust its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRef {
    pub pid: u32,
}

/// How the engine run ended, as seen by the task runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Cancelled,
    Failed(TaskError),
}

/// Mutable per-task record. Fields are private; transitions are methods.
#[derive(Debug, Clone)]
pub struct TaskStatus {
    index: usize,
    link: LinkDescriptor,
    output: PathBuf,
    state: TaskState,
    progress: f64,
    size_bytes: u64,
    speed: String,
    elapsed: Duration,
    duration: Duration,
    remaining: Duration,
    error: Option<TaskError>,
    process: Option<ProcessRef>,
    started: bool,
}

impl TaskStatus {
    pub fn new(index: usize, link: LinkDescriptor, output: PathBuf) -> Self {
        Self {
            index,
            link,
            output,
            state: TaskState::Queued,
            progress: 0.0,
            size_bytes: 0,
            speed: String::new(),
            elapsed: Duration::ZERO,
            duration: Duration::ZERO,
            remaining: Duration::ZERO,
            error: None,
            process: None,
            started: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn link(&self) -> &LinkDescriptor {
        &self.link
    }

    pub fn name(&self) -> &str {
        &self.link.name
    }

    pub fn url(&self) -> &str {
        &self.link.url
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Percentage in [0, 100].
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn speed(&self) -> &str {
        &self.speed
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Total media duration; zero until the engine announces it.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn process(&self) -> Option<ProcessRef> {
        self.process
    }

    /// Engine spawned: Queued/Paused -> Downloading with a live process.
    /// Returns false (and changes nothing) if the task is already terminal.
    pub fn mark_started(&mut self, process: Option<ProcessRef>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = TaskState::Downloading;
        self.process = process;
        self.started = true;
        true
    }

    /// Drops the process reference before the engine is reaped, so a pause
    /// toggle can never reach a recycled pid. The state is left as is.
    pub fn detach_process(&mut self) {
        self.process = None;
    }

    /// Applies a global pause toggle. Returns the process to throttle or
    /// restore, if the task has one.
    ///
    /// Unstarted tasks only move between Queued and Paused (held by a worker
    /// waiting for the pool to resume).
    pub fn apply_pause(&mut self, paused: bool) -> Option<ProcessRef> {
        if self.state.is_terminal() {
            return None;
        }
        if self.started {
            self.state = if paused {
                TaskState::Paused
            } else {
                TaskState::Downloading
            };
            return self.process;
        }
        if paused && self.state == TaskState::Queued {
            self.state = TaskState::Paused;
        } else if !paused && self.state == TaskState::Paused {
            self.state = TaskState::Queued;
        }
        None
    }

    /// Sets the total duration once; later announcements are ignored.
    pub fn set_duration(&mut self, duration: Duration) {
        if self.duration.is_zero() && !duration.is_zero() {
            self.duration = duration;
        }
    }

    /// Records elapsed media time and, when the duration is known, recomputes
    /// progress and remaining time.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        if self.state.is_terminal() {
            return;
        }
        self.elapsed = elapsed;
        if self.duration.is_zero() {
            return;
        }
        let pct = elapsed.as_secs_f64() / self.duration.as_secs_f64() * 100.0;
        self.progress = self.progress.max(pct.min(MAX_ACTIVE_PROGRESS));
        self.remaining = self.duration.saturating_sub(elapsed);
    }

    pub fn set_size(&mut self, bytes: u64) {
        if !self.state.is_terminal() {
            self.size_bytes = bytes;
        }
    }

    pub fn set_speed(&mut self, speed: &str) {
        if !self.state.is_terminal() {
            self.speed = speed.to_string();
        }
    }

    /// The engine could not be started: straight to Failed, no process recorded.
    pub fn fail_to_start(&mut self, error: TaskError) {
        if self.state.is_terminal() {
            return;
        }
        self.process = None;
        self.state = TaskState::Failed;
        self.error = Some(error);
    }

    /// Cancellation observed before any process was started.
    pub fn cancel_unstarted(&mut self) {
        if self.state.is_terminal() || self.started {
            return;
        }
        self.state = TaskState::Cancelled;
    }

    /// Engine process is gone: clear the process reference and commit the
    /// terminal state. No-op on an already-terminal task except for the clear.
    pub fn finish(&mut self, outcome: TaskOutcome) {
        self.process = None;
        if self.state.is_terminal() {
            return;
        }
        match outcome {
            TaskOutcome::Success => {
                self.state = TaskState::Completed;
                self.progress = 100.0;
                self.remaining = Duration::ZERO;
            }
            TaskOutcome::Cancelled => self.state = TaskState::Cancelled,
            TaskOutcome::Failed(error) => {
                self.state = TaskState::Failed;
                self.error = Some(error);
            }
        }
    }
}

/// Shared handle for one task: the locked status record plus the task's own
/// cancellation signal.
#[derive(Debug)]
pub struct Task {
    status: Mutex<TaskStatus>,
    cancel: CancellationToken,
}

impl Task {
    pub fn new(status: TaskStatus, cancel: CancellationToken) -> Self {
        Self {
            status: Mutex::new(status),
            cancel,
        }
    }

    /// Exclusive access to the status record. A poisoned lock is recovered:
    /// every transition leaves the record consistent.
    pub fn lock(&self) -> MutexGuard<'_, TaskStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> TaskStatus {
        self.lock().clone()
    }

    pub fn state(&self) -> TaskState {
        self.lock().state()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fires this task's signal. Idempotent; a terminal task ignores it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
