//! Detection of outputs that already exist as playable media.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::task::LinkDescriptor;

/// An output file that already holds media with a known duration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingOutput {
    pub index: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration: Duration,
}

/// Media duration of `path` via the metadata probe, if it is positive.
/// Missing files, probe failures and unparsable output all yield None.
pub async fn probe_duration(ffprobe: &Path, path: &Path) -> Option<Duration> {
    if !path.is_file() {
        return None;
    }
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| tracing::debug!(path = %path.display(), "ffprobe: {}", e))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_probe_duration(stdout: &str) -> Option<Duration> {
    let secs: f64 = stdout.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Probes every resolved output path; returns the ones already complete.
pub async fn find_existing(ffprobe: &Path, outputs: &[PathBuf]) -> Vec<ExistingOutput> {
    let mut found = Vec::new();
    for (index, path) in outputs.iter().enumerate() {
        let Some(duration) = probe_duration(ffprobe, path).await else {
            continue;
        };
        let size_bytes = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        found.push(ExistingOutput {
            index,
            path: path.clone(),
            size_bytes,
            duration,
        });
    }
    found
}

/// Drops entries whose output already exists; keeps order and paths.
pub fn without_existing(
    entries: &[(LinkDescriptor, PathBuf)],
    existing: &[ExistingOutput],
) -> Vec<(LinkDescriptor, PathBuf)> {
    entries
        .iter()
        .filter(|(_, path)| !existing.iter().any(|e| &e.path == path))
        .cloned()
        .collect()
}
