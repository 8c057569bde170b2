//! CLI for the m3ubatch playlist downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use m3ubatch_core::config;
use std::path::PathBuf;

use commands::{run_batch, run_config, RunArgs};

/// Top-level CLI for m3ubatch.
#[derive(Debug, Parser)]
#[command(name = "m3ubatch")]
#[command(about = "m3ubatch: parallel M3U playlist downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every entry of an M3U playlist.
    Run {
        /// Path to the .m3u/.m3u8 playlist.
        playlist: PathBuf,
        /// Directory for the downloaded files (default: playlist name next to it).
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Number of simultaneous downloads (overrides config).
        #[arg(short = 'j', long, value_name = "N")]
        parallel: Option<usize>,
        /// Engine rate limit such as 500k or 2M (advisory with stream copy); `none` disables it.
        #[arg(long, value_name = "RATE")]
        speed_limit: Option<String>,
        /// Network timeout handed to the engine, in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Extra rounds for failed downloads.
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
        /// Download again even when the output file already holds media.
        #[arg(long)]
        overwrite: bool,
        /// Keep the dashboard open after every download has finished.
        #[arg(long)]
        stay: bool,
    },

    /// Show or change saved settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current settings.
    Show,
    /// Print the settings file location.
    Path,
    /// Update one or more settings.
    Set {
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,
        #[arg(long, value_name = "N")]
        retries: Option<u32>,
        /// Rate limit such as 2M, or `none`.
        #[arg(long, value_name = "RATE")]
        speed_limit: Option<String>,
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Media engine binary.
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<String>,
        /// Metadata probe binary.
        #[arg(long, value_name = "PATH")]
        ffprobe: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Run {
                playlist,
                output_dir,
                parallel,
                speed_limit,
                timeout,
                retries,
                overwrite,
                stay,
            } => {
                let args = RunArgs {
                    playlist,
                    output_dir,
                    parallel,
                    speed_limit,
                    timeout,
                    retries,
                    overwrite,
                    stay,
                };
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_batch(cfg, args).await?;
            }
            CliCommand::Config { action } => {
                // Unvalidated so `config set` can repair an out-of-range file.
                let cfg = config::load_unchecked()?;
                tracing::debug!("loaded config for editing: {:?}", cfg);
                run_config(cfg, action)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
