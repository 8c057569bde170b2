//! Engine progress stream decoding.
//!
//! The engine writes `key=value` lines on its progress channel (`out_time_us`,
//! `total_size`, `speed`, ...) and announces the input length once on its log
//! channel as `Duration: HH:MM:SS.ff`. Anything else is ignored.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

use crate::task::TaskStatus;

/// One recognized progress update.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Total media duration announced by the engine.
    Duration(Duration),
    /// Media time written so far.
    OutTime(Duration),
    /// Bytes written so far.
    TotalSize(u64),
    /// Transfer-rate label, e.g. `2.5x`.
    Speed(String),
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("static regex")
    })
}

/// Decodes one line from either engine channel. Returns None for anything
/// that is not a recognized update, including malformed values.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    if let Some(caps) = duration_re().captures(line) {
        let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
        let (h, m, s, cs) = (field(1)?, field(2)?, field(3)?, field(4)?);
        let total = Duration::from_secs(h * 3600 + m * 60 + s) + Duration::from_millis(cs * 10);
        return Some(ProgressEvent::Duration(total));
    }

    let (key, value) = line.trim().split_once('=')?;
    let value = value.trim();
    match key.trim() {
        "out_time_us" => value
            .parse::<u64>()
            .ok()
            .map(|us| ProgressEvent::OutTime(Duration::from_micros(us))),
        "total_size" => value.parse::<u64>().ok().map(ProgressEvent::TotalSize),
        "speed" if !value.is_empty() => Some(ProgressEvent::Speed(value.to_string())),
        _ => None,
    }
}

/// Applies an update to the task record. The caller holds the task lock.
pub fn apply(status: &mut TaskStatus, event: ProgressEvent) {
    match event {
        ProgressEvent::Duration(d) => status.set_duration(d),
        ProgressEvent::OutTime(t) => status.set_elapsed(t),
        ProgressEvent::TotalSize(bytes) => status.set_size(bytes),
        ProgressEvent::Speed(label) => status.set_speed(&label),
    }
}
