//! Frame rendering: one row per task plus header and footer lines.

use crossterm::style::{StyledContent, Stylize};
use std::time::Duration;

use crate::task::{TaskState, TaskStatus};

const NAME_WIDTH: usize = 40;
const NAME_HEAD: usize = 18;
const BAR_WIDTH: usize = 10;
const MEDIA_SUFFIXES: [&str; 5] = [".mp4", ".mkv", ".m3u8", ".ts", ".webm"];

/// Builds every line of one dashboard frame.
pub fn render_frame(tasks: &[TaskStatus], paused: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(tasks.len() + 4);
    let title = if paused {
        "m3ubatch (paused)"
    } else {
        "m3ubatch"
    };
    lines.push(format!("{}  {}", title.bold(), summary(tasks)));
    lines.push(String::new());
    lines.extend(tasks.iter().map(render_row));
    lines.push(String::new());
    let footer = if paused {
        "[Space] Resume       | [Esc] Exit"
    } else {
        "[Space] Pause/Resume | [Esc] Exit"
    };
    lines.push(footer.bold().to_string());
    lines
}

fn summary(tasks: &[TaskStatus]) -> String {
    let done = tasks
        .iter()
        .filter(|t| t.state() == TaskState::Completed)
        .count();
    let active = tasks
        .iter()
        .filter(|t| matches!(t.state(), TaskState::Downloading | TaskState::Paused))
        .count();
    format!("{}/{} done, {} active", done, tasks.len(), active)
}

pub fn render_row(task: &TaskStatus) -> String {
    let info = if task.state() == TaskState::Failed {
        task.error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "failed".to_string())
    } else if task.progress() > 0.0 {
        format!(
            "{:7.2}MB @ {} ({}/{}) [~{}]",
            task.size_bytes() as f64 / 1_048_576.0,
            if task.speed().is_empty() { "?" } else { task.speed() },
            format_duration(task.elapsed()),
            format_duration(task.duration()),
            format_duration(estimated_remaining(task)),
        )
    } else {
        "...".to_string()
    };
    format!(
        "{:>2} {}  {:<width$}  [{}] {:5.1}%  {}",
        task.index() + 1,
        glyph(task.state()),
        truncate_name(task.name()),
        progress_bar(task.progress()),
        task.progress(),
        info,
        width = NAME_WIDTH,
    )
}

fn glyph(state: TaskState) -> StyledContent<&'static str> {
    match state {
        TaskState::Queued => "→".blue(),
        TaskState::Downloading => "↓".cyan(),
        TaskState::Paused => "⏸".yellow(),
        TaskState::Completed => "✓".green(),
        TaskState::Failed => "✗".red(),
        TaskState::Cancelled => "✗".dark_red(),
    }
}

/// Wall-clock estimate: remaining media time divided by the engine's speed factor.
/// Falls back to the media time when the quotient does not fit a `Duration`.
fn estimated_remaining(task: &TaskStatus) -> Duration {
    let remaining = task.remaining();
    match task
        .speed()
        .trim_end_matches('x')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| *s > 0.0 && s.is_finite())
    {
        Some(factor) => {
            Duration::try_from_secs_f64(remaining.as_secs_f64() / factor).unwrap_or(remaining)
        }
        None => remaining,
    }
}

/// Drops a media suffix and shortens to the column width as `head...tail`.
pub fn truncate_name(name: &str) -> String {
    let base = MEDIA_SUFFIXES
        .iter()
        .find_map(|s| name.strip_suffix(s))
        .unwrap_or(name);
    let chars: Vec<char> = base.chars().collect();
    if chars.len() <= NAME_WIDTH {
        return base.to_string();
    }
    let tail = NAME_WIDTH - NAME_HEAD - 3;
    let head: String = chars[..NAME_HEAD].iter().collect();
    let end: String = chars[chars.len() - tail..].iter().collect();
    format!("{}...{}", head, end)
}

pub fn progress_bar(pct: f64) -> String {
    let filled = ((pct / 10.0) as usize).min(BAR_WIDTH);
    format!("{}{}", "=".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
