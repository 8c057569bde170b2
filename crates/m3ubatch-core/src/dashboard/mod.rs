//! Dashboard loop: repaints the task table on a fixed tick and handles keys
//! between ticks.
//!
//! Input is polled with a timeout bounded by the time left until the next
//! tick, so a quiet keyboard never delays a redraw and an interrupt is seen
//! within one tick.

mod input;
mod render;
mod terminal;

pub use input::{map_key, KeyCommand, KeySource, NoKeys, ScriptedKeys, TerminalKeys};
pub use render::{format_duration, progress_bar, render_frame, render_row, truncate_name};
pub use terminal::TerminalGuard;

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::scheduler::{toggle_pause, RunControl};
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Redraw cadence.
    pub tick: Duration,
    /// Leave the loop once a frame shows every task terminal.
    pub exit_when_done: bool,
    /// How long an early exit keeps repainting while cancelled tasks wind down.
    pub drain_limit: Duration,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            exit_when_done: true,
            drain_limit: Duration::from_secs(3),
        }
    }
}

/// Why the dashboard loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardExit {
    /// Every task reached a terminal state.
    Finished,
    /// The user pressed Esc/q.
    Quit,
    /// Ctrl-C or a termination request.
    Interrupted,
}

pub struct Dashboard<K, W> {
    tasks: Vec<Arc<Task>>,
    control: Arc<RunControl>,
    keys: K,
    out: W,
    options: DashboardOptions,
}

impl<K: KeySource, W: Write> Dashboard<K, W> {
    pub fn new(
        tasks: Vec<Arc<Task>>,
        control: Arc<RunControl>,
        keys: K,
        out: W,
        options: DashboardOptions,
    ) -> Self {
        Self {
            tasks,
            control,
            keys,
            out,
            options,
        }
    }

    pub fn run(mut self) -> Result<DashboardExit> {
        let exit = self.run_until_exit()?;
        if exit != DashboardExit::Finished {
            self.drain()?;
        }
        Ok(exit)
    }

    fn run_until_exit(&mut self) -> Result<DashboardExit> {
        loop {
            let all_terminal = self.paint()?;
            if self.options.exit_when_done && all_terminal {
                return Ok(DashboardExit::Finished);
            }

            let next_tick = Instant::now() + self.options.tick;
            loop {
                if self.control.is_interrupted() {
                    return Ok(DashboardExit::Interrupted);
                }
                let now = Instant::now();
                if now >= next_tick {
                    break;
                }
                match self.keys.poll(next_tick - now)? {
                    Some(KeyCommand::TogglePause) => {
                        toggle_pause(&self.tasks, &self.control);
                        break;
                    }
                    Some(KeyCommand::Quit) => {
                        tracing::info!("dashboard quit by user");
                        for task in &self.tasks {
                            task.cancel();
                        }
                        return Ok(DashboardExit::Quit);
                    }
                    Some(KeyCommand::Interrupt) => {
                        self.control.interrupt();
                        return Ok(DashboardExit::Interrupted);
                    }
                    None => {}
                }
            }
        }
    }

    /// Keeps painting until cancelled tasks are terminal so the last frame
    /// shows their real end state.
    fn drain(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.options.drain_limit;
        while !self.paint()? && Instant::now() < deadline {
            std::thread::sleep(self.options.tick.min(Duration::from_millis(50)));
        }
        Ok(())
    }

    /// Paints one frame; returns whether every task was terminal in it.
    fn paint(&mut self) -> io::Result<bool> {
        let snapshots: Vec<TaskStatus> = self.tasks.iter().map(|t| t.snapshot()).collect();
        let all_terminal = snapshots.iter().all(|t| t.state().is_terminal());
        let lines = render_frame(&snapshots, self.control.is_paused());
        queue!(self.out, MoveTo(0, 0))?;
        for line in &lines {
            queue!(
                self.out,
                Print(line),
                Clear(ClearType::UntilNewLine),
                Print("\r\n")
            )?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        Ok(all_terminal)
    }
}
