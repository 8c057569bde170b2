//! Shell scripts standing in for the media engine.
//!
//! Each script receives the real engine argument list; the output path is
//! always the last argument.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use m3ubatch_core::engine::EngineConfig;
use m3ubatch_core::task::LinkDescriptor;

/// Announces a 10s input, reports halfway, writes the output and exits 0.
pub const COMPLETES: &str = r#"
for last; do :; done
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 0 kb/s" >&2
echo "out_time_us=5000000"
echo "total_size=1048576"
echo "speed=2.0x"
sleep 0.2
echo "out_time_us=10000000"
: > "$last"
exit 0
"#;

/// Fails the way an unreachable source does.
pub const FAILS_404: &str = r#"
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 0 kb/s" >&2
echo "out_time_us=1000000"
echo "HTTP error 404 Not Found" >&2
exit 1
"#;

/// Never finishes on its own.
pub const HANGS: &str = r#"
echo "  Duration: 00:01:00.00, start: 0.000000, bitrate: 0 kb/s" >&2
echo "out_time_us=1000000"
exec sleep 30
"#;

/// Runs long enough to be observed, then completes.
pub const SLOW: &str = r#"
for last; do :; done
echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 0 kb/s" >&2
echo "out_time_us=2000000"
sleep 0.6
echo "out_time_us=8000000"
sleep 0.2
: > "$last"
exit 0
"#;

/// Writes `body` as an executable `sh` script in `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("write fake engine");
    let mut perms = fs::metadata(&path).expect("stat fake engine").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod fake engine");
    path
}

pub fn engine(dir: &Path, body: &str) -> EngineConfig {
    EngineConfig::new(write_script(dir, "fake-ffmpeg", body))
}

pub fn links(n: usize) -> Vec<LinkDescriptor> {
    (1..=n)
        .map(|i| LinkDescriptor::new(format!("Episode {}", i), format!("https://cdn.test/{}.m3u8", i)))
        .collect()
}

/// Prefixes `body` so each engine start appends a line to `starts` next to the script.
pub fn counting_starts(body: &str) -> String {
    format!("echo start >> \"$(dirname \"$0\")/starts\"\n{}", body)
}

/// Number of engine starts recorded by a `counting_starts` script in `dir`.
pub fn starts(dir: &Path) -> usize {
    fs::read_to_string(dir.join("starts"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
