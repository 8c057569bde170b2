pub mod config;
pub mod logging;

pub mod dashboard;
pub mod engine;
pub mod existing;
pub mod output_path;
pub mod playlist;
pub mod progress;
pub mod scheduler;
pub mod task;
