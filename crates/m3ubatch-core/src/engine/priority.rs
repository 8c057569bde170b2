//! Soft pause: throttle a running engine through CPU and I/O scheduling
//! priority instead of suspending it.
//!
//! This is approximate. The process keeps running at reduced priority, and
//! restoring the default priority may be refused for unprivileged users.
//! Every failure degrades to a descriptive [`SoftPause`] value and a log line;
//! nothing here ever fails the task.

use std::fmt;

use crate::task::ProcessRef;

/// Nice value applied while paused.
#[cfg(unix)]
const PAUSED_NICE: i32 = 19;
#[cfg(unix)]
const DEFAULT_NICE: i32 = 0;

/// Result of a pause/resume request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftPause {
    /// No live process to act on.
    NoProcess,
    /// Priority lowered.
    Throttled,
    /// Priority reset to defaults.
    Restored,
    /// The primitive ran but was refused or only partly applied.
    Degraded(String),
    /// No priority primitive on this platform.
    Unsupported,
}

impl fmt::Display for SoftPause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftPause::NoProcess => write!(f, "no process"),
            SoftPause::Throttled => write!(f, "priority lowered (soft pause)"),
            SoftPause::Restored => write!(f, "priority reset (soft resume)"),
            SoftPause::Degraded(why) => write!(f, "soft pause degraded: {}", why),
            SoftPause::Unsupported => write!(f, "pause not supported"),
        }
    }
}

/// Demotes the process to idle CPU and I/O priority.
pub fn pause(process: Option<ProcessRef>) -> SoftPause {
    let Some(process) = process else {
        return SoftPause::NoProcess;
    };
    let outcome = imp::pause(process.pid);
    log_outcome("pause", process.pid, &outcome);
    outcome
}

/// Resets the process to default CPU and I/O priority.
pub fn resume(process: Option<ProcessRef>) -> SoftPause {
    let Some(process) = process else {
        return SoftPause::NoProcess;
    };
    let outcome = imp::resume(process.pid);
    log_outcome("resume", process.pid, &outcome);
    outcome
}

fn log_outcome(action: &str, pid: u32, outcome: &SoftPause) {
    match outcome {
        SoftPause::Degraded(_) | SoftPause::Unsupported => {
            tracing::warn!(pid, "{}: {}", action, outcome)
        }
        _ => tracing::debug!(pid, "{}: {}", action, outcome),
    }
}

#[cfg(unix)]
mod imp {
    use super::{SoftPause, DEFAULT_NICE, PAUSED_NICE};
    use std::io;

    pub(super) fn pause(pid: u32) -> SoftPause {
        combine(
            set_nice(pid, PAUSED_NICE),
            io_class::set(pid, io_class::IDLE),
            SoftPause::Throttled,
        )
    }

    pub(super) fn resume(pid: u32) -> SoftPause {
        combine(
            set_nice(pid, DEFAULT_NICE),
            io_class::set(pid, io_class::BEST_EFFORT_DEFAULT),
            SoftPause::Restored,
        )
    }

    fn combine(cpu: io::Result<()>, io: io::Result<()>, ok: SoftPause) -> SoftPause {
        match (cpu, io) {
            (Ok(()), Ok(())) => ok,
            (Err(e), Ok(())) => SoftPause::Degraded(format!("cpu priority: {}", e)),
            (Ok(()), Err(e)) => SoftPause::Degraded(format!("io priority: {}", e)),
            (Err(c), Err(i)) => {
                SoftPause::Degraded(format!("cpu priority: {}; io priority: {}", c, i))
            }
        }
    }

    fn set_nice(pid: u32, nice: i32) -> io::Result<()> {
        // SAFETY: setpriority only reads its arguments.
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, pid as libc::id_t, nice) };
        if rc == -1 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    #[cfg(target_os = "linux")]
    mod io_class {
        use std::io;

        const IOPRIO_WHO_PROCESS: libc::c_long = 1;
        const IOPRIO_CLASS_SHIFT: libc::c_long = 13;
        pub(super) const IDLE: libc::c_long = 3 << IOPRIO_CLASS_SHIFT;
        pub(super) const BEST_EFFORT_DEFAULT: libc::c_long =
            (2 << IOPRIO_CLASS_SHIFT) | 4;

        pub(super) fn set(pid: u32, prio: libc::c_long) -> io::Result<()> {
            // SAFETY: ioprio_set takes plain integer arguments.
            let rc = unsafe {
                libc::syscall(
                    libc::SYS_ioprio_set,
                    IOPRIO_WHO_PROCESS,
                    pid as libc::c_long,
                    prio,
                )
            };
            if rc == -1 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    mod io_class {
        use std::io;

        pub(super) const IDLE: i64 = 0;
        pub(super) const BEST_EFFORT_DEFAULT: i64 = 0;

        pub(super) fn set(_pid: u32, _prio: i64) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::SoftPause;
    use std::process::{Command, Stdio};

    const IDLE_PRIORITY_CLASS: u32 = 64;
    const NORMAL_PRIORITY_CLASS: u32 = 32;

    pub(super) fn pause(pid: u32) -> SoftPause {
        set_priority_class(pid, IDLE_PRIORITY_CLASS, SoftPause::Throttled)
    }

    pub(super) fn resume(pid: u32) -> SoftPause {
        set_priority_class(pid, NORMAL_PRIORITY_CLASS, SoftPause::Restored)
    }

    fn set_priority_class(pid: u32, class: u32, ok: SoftPause) -> SoftPause {
        let status = Command::new("wmic")
            .args([
                "process",
                "where",
                &format!("ProcessId={}", pid),
                "CALL",
                "setpriority",
                &class.to_string(),
            ])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => ok,
            Ok(s) => SoftPause::Degraded(format!("wmic exited with {}", s)),
            Err(_) => SoftPause::Unsupported,
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod imp {
    use super::SoftPause;

    pub(super) fn pause(_pid: u32) -> SoftPause {
        SoftPause::Unsupported
    }

    pub(super) fn resume(_pid: u32) -> SoftPause {
        SoftPause::Unsupported
    }
}
