//! CLI command handlers, one file per command.

mod config;
mod run;

pub use config::run_config;
pub use run::{run_batch, RunArgs};

#[cfg(test)]
pub(crate) use config::{apply_set, SetFields};
#[cfg(test)]
pub(crate) use run::{apply_overrides, default_output_dir, stops_retries};
