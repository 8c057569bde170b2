use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Upper bound on the worker pool size accepted from settings.
pub const MAX_PARALLEL_DOWNLOADS: usize = 20;
/// Upper bound on CLI-level retry rounds.
pub const MAX_RETRIES: u32 = 10;

/// Settings validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("parallel downloads must be between 1 and 20, got {0}")]
    Parallel(usize),
    #[error("retries must be at most 10, got {0}")]
    Retries(u32),
    #[error("timeout must be greater than zero")]
    Timeout,
    #[error("invalid speed limit {0:?} (expected e.g. 500k, 2M, 1.5G)")]
    SpeedLimit(String),
}

/// Global settings loaded from `~/.config/m3ubatch/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of workers draining the task queue.
    pub parallel_downloads: usize,
    /// Extra rounds the CLI runs for failed tasks. Not used by the orchestrator.
    pub retries: u32,
    /// Optional rate limit handed to the engine (e.g. "2M"). Advisory under stream copy.
    pub speed_limit: Option<String>,
    /// Network read/write timeout handed to the engine, in seconds.
    pub timeout_secs: u64,
    /// Media engine binary.
    pub ffmpeg_path: String,
    /// Metadata probe binary used to detect already-downloaded files.
    pub ffprobe_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel_downloads: 4,
            retries: 3,
            speed_limit: None,
            timeout_secs: 30,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel_downloads == 0 || self.parallel_downloads > MAX_PARALLEL_DOWNLOADS {
            return Err(ConfigError::Parallel(self.parallel_downloads));
        }
        if self.retries > MAX_RETRIES {
            return Err(ConfigError::Retries(self.retries));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Timeout);
        }
        if let Some(limit) = &self.speed_limit {
            if !speed_limit_re().is_match(limit) {
                return Err(ConfigError::SpeedLimit(limit.clone()));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn speed_limit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)?[kKmMgG]$").expect("static regex"))
}

/// Parses a user-supplied speed limit. Empty or `none` clears the limit.
pub fn parse_speed_limit(raw: &str) -> Result<Option<String>, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if speed_limit_re().is_match(raw) {
        Ok(Some(raw.to_string()))
    } else {
        Err(ConfigError::SpeedLimit(raw.to_string()))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("m3ubatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from disk, creating a default file if none exists.
/// Out-of-range values are an error.
pub fn load_or_init() -> Result<Settings> {
    let path = config_path()?;
    let cfg = load_unchecked()?;
    if let Err(e) = cfg.validate() {
        tracing::warn!("config at {} is invalid: {}", path.display(), e);
        return Err(e.into());
    }
    Ok(cfg)
}

/// Like `load_or_init` but without validation, so a bad file can still be edited.
pub fn load_unchecked() -> Result<Settings> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = Settings::default();
        save(&default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    read_settings(&path)
}

/// Parses a settings file without validating it.
pub fn read_settings(path: &Path) -> Result<Settings> {
    let data = fs::read_to_string(path)?;
    Ok(toml::from_str(&data)?)
}

pub fn save(settings: &Settings) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, toml::to_string_pretty(settings)?)?;
    Ok(())
}
