//! Process controller for the external media engine.
//!
//! Spawns one engine per task with stream copy and a machine-readable progress
//! channel, exposes its output lines to the task runner, and terminates it on
//! cancellation. Soft pause/resume lives in [`priority`].

pub mod priority;

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::config::Settings;
use crate::task::{ProcessRef, TaskError, TaskOutcome};

pub use priority::{pause, resume, SoftPause};

/// How to invoke the engine for every task of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub program: PathBuf,
    /// Optional rate limit passed through verbatim (e.g. "2M") as `-maxrate`.
    /// Advisory only: the engine applies it to encoders, and stream copy has none.
    pub rate_limit: Option<String>,
    /// Network read/write timeout handed to the engine.
    pub timeout: Option<Duration>,
}

impl EngineConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            rate_limit: None,
            timeout: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            program: PathBuf::from(&settings.ffmpeg_path),
            rate_limit: settings.speed_limit.clone(),
            timeout: Some(settings.timeout()).filter(|t| !t.is_zero()),
        }
    }

    /// Engine arguments for one task; the output path is the only positional.
    pub fn args(&self, url: &str, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-y"]
            .iter()
            .map(OsString::from)
            .collect();
        if let Some(timeout) = self.timeout {
            args.push("-rw_timeout".into());
            args.push(timeout.as_micros().to_string().into());
        }
        args.push("-i".into());
        args.push(url.into());
        for a in ["-c", "copy", "-bsf:a", "aac_adtstoasc", "-progress", "pipe:1"] {
            args.push(a.into());
        }
        if let Some(limit) = &self.rate_limit {
            args.push("-maxrate".into());
            args.push(limit.into());
        }
        args.push(output.as_os_str().to_owned());
        args
    }
}

/// A line read from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    /// Machine-readable progress channel (stdout).
    Progress(String),
    /// Human log channel (stderr).
    Log(String),
}

impl EngineLine {
    pub fn text(&self) -> &str {
        match self {
            EngineLine::Progress(l) | EngineLine::Log(l) => l,
        }
    }
}

/// A running engine process with both output channels attached.
pub struct EngineProcess {
    child: Child,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<Lines<BufReader<ChildStderr>>>,
}

/// Starts the engine for one task.
pub fn spawn(config: &EngineConfig, url: &str, output: &Path) -> Result<EngineProcess, TaskError> {
    let mut cmd = Command::new(&config.program);
    cmd.args(config.args(url, output))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| TaskError::Spawn {
        program: config.program.display().to_string(),
        reason: e.to_string(),
    })?;
    let stdout = child.stdout.take().map(|s| BufReader::new(s).lines());
    let stderr = child.stderr.take().map(|s| BufReader::new(s).lines());
    tracing::debug!(
        program = %config.program.display(),
        pid = child.id(),
        output = %output.display(),
        "engine started"
    );
    Ok(EngineProcess {
        child,
        stdout,
        stderr,
    })
}

impl EngineProcess {
    pub fn process_ref(&self) -> Option<ProcessRef> {
        self.child.id().map(|pid| ProcessRef { pid })
    }

    /// Next line from whichever channel has one. None once both are closed.
    /// A read error closes that channel.
    pub async fn next_line(&mut self) -> Option<EngineLine> {
        loop {
            let (out, err) = match (self.stdout.as_mut(), self.stderr.as_mut()) {
                (None, None) => return None,
                pair => pair,
            };
            tokio::select! {
                line = next_or_pending(out) => match line {
                    Ok(Some(l)) => return Some(EngineLine::Progress(l)),
                    _ => self.stdout = None,
                },
                line = next_or_pending(err) => match line {
                    Ok(Some(l)) => return Some(EngineLine::Log(l)),
                    _ => self.stderr = None,
                },
            }
        }
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kills the engine and reaps it.
    pub async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("engine kill: {}", e);
        }
        if let Err(e) = self.child.wait().await {
            tracing::debug!("engine reap after kill: {}", e);
        }
    }
}

async fn next_or_pending<R>(lines: Option<&mut Lines<R>>) -> io::Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match lines {
        Some(l) => l.next_line().await,
        None => std::future::pending().await,
    }
}

/// Maps the engine's exit to a task outcome. A non-zero exit while the
/// task's signal is active is a cancellation, never a failure.
pub fn classify_exit(
    status: io::Result<ExitStatus>,
    cancelled: bool,
    detail: Option<String>,
) -> TaskOutcome {
    match status {
        Ok(s) if s.success() => TaskOutcome::Success,
        _ if cancelled => TaskOutcome::Cancelled,
        Ok(s) => TaskOutcome::Failed(TaskError::Exited {
            code: s.code(),
            detail,
        }),
        Err(e) => TaskOutcome::Failed(TaskError::Wait(e.to_string())),
    }
}

/// Checks that the engine binary can be run at all (`<program> -version`).
pub async fn check_available(program: &Path) -> anyhow::Result<()> {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| anyhow::anyhow!("{} not runnable: {}", program.display(), e))?;
    if !status.success() {
        anyhow::bail!("{} -version exited with {}", program.display(), status);
    }
    Ok(())
}
