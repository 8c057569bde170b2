//! Failure recorded on a Failed task.

/// Why a task ended in the Failed state. Cloneable so dashboard snapshots can carry it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The engine binary could not be started (missing, not executable, bad arguments).
    #[error("failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },
    /// The engine exited unsuccessfully without the task being cancelled.
    #[error("{}", exited_message(*code, detail.as_deref()))]
    Exited {
        code: Option<i32>,
        detail: Option<String>,
    },
    /// Waiting on the engine process failed.
    #[error("waiting on engine: {0}")]
    Wait(String),
}

fn exited_message(code: Option<i32>, detail: Option<&str>) -> String {
    let head = match code {
        Some(c) => format!("engine exited with code {}", c),
        None => "engine terminated by signal".to_string(),
    };
    match detail {
        Some(d) => format!("{}: {}", head, d),
        None => head,
    }
}
