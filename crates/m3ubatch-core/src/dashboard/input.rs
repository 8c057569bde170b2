//! Key sources for the dashboard loop.

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// What a keypress asks the dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    TogglePause,
    Quit,
    /// Ctrl-C while the terminal is in raw mode.
    Interrupt,
}

/// Non-blocking key input: waits at most `timeout` for one command.
pub trait KeySource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<KeyCommand>>;
}

/// Keyboard input from the controlling terminal (expects raw mode).
#[derive(Debug, Default)]
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn poll(&mut self, timeout: Duration) -> Result<Option<KeyCommand>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(map_key(key)),
            _ => Ok(None),
        }
    }
}

pub fn map_key(key: KeyEvent) -> Option<KeyCommand> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Interrupt)
        }
        KeyCode::Char(' ') => Some(KeyCommand::TogglePause),
        KeyCode::Esc | KeyCode::Char('q') => Some(KeyCommand::Quit),
        _ => None,
    }
}

/// No keyboard: just waits out the timeout.
#[derive(Debug, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self, timeout: Duration) -> Result<Option<KeyCommand>> {
        std::thread::sleep(timeout);
        Ok(None)
    }
}

/// Replays commands at fixed offsets from the first poll. Used to drive the
/// dashboard without a terminal.
#[derive(Debug)]
pub struct ScriptedKeys {
    script: VecDeque<(Duration, KeyCommand)>,
    started: Option<Instant>,
}

impl ScriptedKeys {
    pub fn new(script: impl IntoIterator<Item = (Duration, KeyCommand)>) -> Self {
        let mut script: Vec<_> = script.into_iter().collect();
        script.sort_by_key(|(at, _)| *at);
        Self {
            script: script.into(),
            started: None,
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self, timeout: Duration) -> Result<Option<KeyCommand>> {
        let started = *self.started.get_or_insert_with(Instant::now);
        let Some(&(at, cmd)) = self.script.front() else {
            std::thread::sleep(timeout);
            return Ok(None);
        };
        let due = started + at;
        let now = Instant::now();
        if due > now + timeout {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        std::thread::sleep(due.saturating_duration_since(now));
        self.script.pop_front();
        Ok(Some(cmd))
    }
}
