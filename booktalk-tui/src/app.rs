//! Application state for the TUI.

use booktalk_core::{PlaybackController, SessionSnapshot};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::{mpsc, watch};

/// Commands the UI sends to the session driver task.
#[derive(Debug)]
pub enum AppCommand {
    /// Submit a typed message as a conversational turn
    Submit(String),
    /// Leave book discussion mode
    ExitBookMode,
    /// Stop the spoken reply and republish the snapshot
    StopAudio,
}

/// Main application state.
pub struct App {
    /// Command channel to the driver task; dropped on shutdown so the
    /// driver's loop ends
    commands: Option<mpsc::UnboundedSender<AppCommand>>,
    /// Session snapshots published by the orchestrator
    snapshots: watch::Receiver<SessionSnapshot>,
    /// Direct playback handle. Esc calls its sync `stop()` here so the
    /// interrupt works even while a turn is in flight on the driver task.
    playback: PlaybackController,
    /// Latest snapshot, refreshed each frame
    pub snapshot: SessionSnapshot,
    /// Input line under composition
    pub input: String,
    /// Timeline scroll offset, in lines back from the bottom
    pub scroll_offset: usize,
    /// Whether the app should exit
    pub should_quit: bool,
}

impl App {
    pub fn new(
        commands: mpsc::UnboundedSender<AppCommand>,
        snapshots: watch::Receiver<SessionSnapshot>,
        playback: PlaybackController,
    ) -> Self {
        let snapshot = snapshots.borrow().clone();
        Self {
            commands: Some(commands),
            snapshots,
            playback,
            snapshot,
            input: String::new(),
            scroll_offset: 0,
            should_quit: false,
        }
    }

    /// Pull the latest published snapshot (call each frame).
    pub fn refresh(&mut self) {
        self.snapshot = self.snapshots.borrow_and_update().clone();
    }

    /// Drop the command channel so the driver task winds down.
    pub fn shutdown(&mut self) {
        self.commands = None;
    }

    fn send(&self, command: AppCommand) {
        if let Some(commands) = &self.commands {
            if commands.send(command).is_err() {
                tracing::error!("session driver is gone; command dropped");
            }
        }
    }

    /// Handle a key event.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('b') => self.send(AppCommand::ExitBookMode),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Enter => self.submit(),
            KeyCode::Esc => {
                // Stop locally first: the driver task may be blocked on a
                // streaming turn and must not gate the interrupt
                self.playback.stop();
                self.send(AppCommand::StopAudio);
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Up => self.scroll_offset = self.scroll_offset.saturating_add(1),
            KeyCode::Down => self.scroll_offset = self.scroll_offset.saturating_sub(1),
            KeyCode::PageUp => self.scroll_offset = self.scroll_offset.saturating_add(10),
            KeyCode::PageDown => self.scroll_offset = self.scroll_offset.saturating_sub(10),
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
    }

    /// Submission is disabled while a turn is in flight.
    fn submit(&mut self) {
        if self.snapshot.processing || self.input.trim().is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.input);
        self.scroll_offset = 0;
        self.send(AppCommand::Submit(text));
    }
}
