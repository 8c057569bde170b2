//! `m3ubatch config` – inspect and edit saved settings.

use anyhow::Result;
use m3ubatch_core::config::{self, Settings};

use crate::cli::ConfigAction;

pub fn run_config(cfg: Settings, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => print_settings(&cfg),
        ConfigAction::Path => println!("{}", config::config_path()?.display()),
        ConfigAction::Set {
            parallel,
            retries,
            speed_limit,
            timeout,
            ffmpeg,
            ffprobe,
        } => {
            let updated = apply_set(
                cfg,
                SetFields {
                    parallel,
                    retries,
                    speed_limit,
                    timeout,
                    ffmpeg,
                    ffprobe,
                },
            )?;
            config::save(&updated)?;
            tracing::info!("settings updated: {:?}", updated);
            print_settings(&updated);
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
pub(crate) struct SetFields {
    pub parallel: Option<usize>,
    pub retries: Option<u32>,
    pub speed_limit: Option<String>,
    pub timeout: Option<u64>,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
}

/// Applies the given fields and validates the result; nothing is saved on error.
pub(crate) fn apply_set(mut cfg: Settings, fields: SetFields) -> Result<Settings> {
    if let Some(n) = fields.parallel {
        cfg.parallel_downloads = n;
    }
    if let Some(n) = fields.retries {
        cfg.retries = n;
    }
    if let Some(raw) = fields.speed_limit {
        cfg.speed_limit = config::parse_speed_limit(&raw)?;
    }
    if let Some(secs) = fields.timeout {
        cfg.timeout_secs = secs;
    }
    if let Some(p) = fields.ffmpeg {
        cfg.ffmpeg_path = p;
    }
    if let Some(p) = fields.ffprobe {
        cfg.ffprobe_path = p;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn print_settings(cfg: &Settings) {
    println!("{:<20} {}", "parallel_downloads", cfg.parallel_downloads);
    println!("{:<20} {}", "retries", cfg.retries);
    println!(
        "{:<20} {}",
        "speed_limit",
        cfg.speed_limit.as_deref().unwrap_or("none")
    );
    println!("{:<20} {}s", "timeout", cfg.timeout_secs);
    println!("{:<20} {}", "ffmpeg", cfg.ffmpeg_path);
    println!("{:<20} {}", "ffprobe", cfg.ffprobe_path);
}
