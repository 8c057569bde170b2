//! Tests for the run subcommand.

use super::parse;
use crate::cli::commands::{apply_overrides, default_output_dir, stops_retries, RunArgs};
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use m3ubatch_core::config::Settings;
use m3ubatch_core::dashboard::DashboardExit;
use m3ubatch_core::scheduler::RunReport;
use m3ubatch_core::task::{LinkDescriptor, TaskOutcome, TaskStatus};
use std::path::{Path, PathBuf};

fn args(playlist: &str) -> RunArgs {
    RunArgs {
        playlist: PathBuf::from(playlist),
        output_dir: None,
        parallel: None,
        speed_limit: None,
        timeout: None,
        retries: None,
        overwrite: false,
        stay: false,
    }
}

#[test]
fn cli_parse_run_defaults() {
    match parse(&["m3ubatch", "run", "shows.m3u"]) {
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
            assert_eq!(playlist, PathBuf::from("shows.m3u"));
            assert!(output_dir.is_none());
            assert!(parallel.is_none());
            assert!(speed_limit.is_none());
            assert!(timeout.is_none());
            assert!(retries.is_none());
            assert!(!overwrite);
            assert!(!stay);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_all_flags() {
    match parse(&[
        "m3ubatch",
        "run",
        "shows.m3u",
        "-o",
        "/tmp/out",
        "-j",
        "6",
        "--speed-limit",
        "2M",
        "--timeout",
        "45",
        "--retries",
        "1",
        "--overwrite",
        "--stay",
    ]) {
        CliCommand::Run {
            output_dir,
            parallel,
            speed_limit,
            timeout,
            retries,
            overwrite,
            stay,
            ..
        } => {
            assert_eq!(output_dir.as_deref(), Some(Path::new("/tmp/out")));
            assert_eq!(parallel, Some(6));
            assert_eq!(speed_limit.as_deref(), Some("2M"));
            assert_eq!(timeout, Some(45));
            assert_eq!(retries, Some(1));
            assert!(overwrite);
            assert!(stay);
        }
        _ => panic!("expected Run with flags"),
    }
}

#[test]
fn cli_parse_run_requires_playlist() {
    assert!(Cli::try_parse_from(["m3ubatch", "run"]).is_err());
}

#[test]
fn overrides_replace_saved_settings() {
    let mut a = args("x.m3u");
    a.parallel = Some(8);
    a.speed_limit = Some("500k".to_string());
    a.timeout = Some(10);
    a.retries = Some(0);
    let cfg = apply_overrides(Settings::default(), &a).unwrap();
    assert_eq!(cfg.parallel_downloads, 8);
    assert_eq!(cfg.speed_limit.as_deref(), Some("500k"));
    assert_eq!(cfg.timeout_secs, 10);
    assert_eq!(cfg.retries, 0);
}

#[test]
fn speed_limit_none_clears_saved_limit() {
    let saved = Settings {
        speed_limit: Some("1M".to_string()),
        ..Settings::default()
    };
    let mut a = args("x.m3u");
    a.speed_limit = Some("none".to_string());
    assert!(apply_overrides(saved, &a).unwrap().speed_limit.is_none());
}

#[test]
fn invalid_overrides_are_rejected() {
    let mut a = args("x.m3u");
    a.parallel = Some(0);
    assert!(apply_overrides(Settings::default(), &a).is_err());

    let mut a = args("x.m3u");
    a.speed_limit = Some("fast".to_string());
    assert!(apply_overrides(Settings::default(), &a).is_err());
}

#[test]
fn default_output_dir_is_playlist_stem() {
    assert_eq!(
        default_output_dir(Path::new("/media/lists/Season 1.m3u")),
        PathBuf::from("/media/lists/Season 1")
    );
    assert_eq!(default_output_dir(Path::new("shows.m3u8")), PathBuf::from("shows"));
}

fn report(outcomes: Vec<TaskOutcome>, exit: DashboardExit) -> RunReport {
    let tasks = outcomes
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| {
            let mut t = TaskStatus::new(
                i,
                LinkDescriptor::new(format!("E{}", i), "https://x/a.m3u8"),
                PathBuf::from(format!("{}.mp4", i)),
            );
            t.mark_started(None);
            t.finish(outcome);
            t
        })
        .collect();
    RunReport { tasks, exit }
}

#[test]
fn failures_are_retried_after_a_clean_round() {
    let r = report(
        vec![TaskOutcome::Success, TaskOutcome::Failed(exit_error())],
        DashboardExit::Finished,
    );
    assert!(!stops_retries(&r));
}

#[test]
fn interrupt_or_cancellation_stops_retries() {
    let r = report(vec![TaskOutcome::Failed(exit_error())], DashboardExit::Interrupted);
    assert!(stops_retries(&r));

    let r = report(
        vec![TaskOutcome::Failed(exit_error()), TaskOutcome::Cancelled],
        DashboardExit::Quit,
    );
    assert!(stops_retries(&r));
}

#[test]
fn quit_after_everything_finished_stops_retries() {
    let r = report(
        vec![TaskOutcome::Success, TaskOutcome::Failed(exit_error())],
        DashboardExit::Quit,
    );
    assert!(stops_retries(&r));
}

fn exit_error() -> m3ubatch_core::task::TaskError {
    m3ubatch_core::task::TaskError::Exited {
        code: Some(1),
        detail: None,
    }
}
