//! Session orchestration
//!
//! [`SessionOrchestrator`] owns the message timeline, the in-flight turn
//! lifecycle and the progress indicators, and coordinates the playback
//! controller and the context tracker. One logical thread of control: at most
//! one turn is in flight, and concurrency is interleaved awaits rather than
//! parallelism, so no locking is needed beyond the playback slot's own shared
//! state.
//!
//! After every mutation the orchestrator publishes a whole-state
//! [`SessionSnapshot`] through a watch channel. Readers see either the pre-
//! or post-mutation state, never a half-applied one.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use crate::audio::PlaybackController;
use crate::context::{ActiveBook, ContextTracker};
use crate::error::Result;
use crate::transport::TurnTransport;
use crate::types::{upsert_step, Message, ProgressStep, Sender, StreamEvent, TurnReply};

/// Greeting seeded into the timeline when a session starts.
pub const WELCOME_NOTICE: &str =
    "Hi! I'm your book companion. Ask me for a recommendation, search for a title, or pick a book to talk about.";
/// Status and placeholder text while the assistant is working on a turn.
pub const THINKING_NOTICE: &str = "Thinking...";
/// Placeholder text while recorded audio is being transcribed.
pub const TRANSCRIBING_NOTICE: &str = "Transcribing...";
/// Timeline notice for a failed turn or failed transcription.
pub const TURN_ERROR_NOTICE: &str =
    "Something went wrong while talking to the assistant. Please try again.";

/// Read-only view of the whole session, published after every mutation.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Conversation timeline
    pub messages: Vec<Message>,
    /// Current status line ("" when idle)
    pub status: String,
    /// Progress steps for the in-flight turn
    pub progress: Vec<ProgressStep>,
    /// True while a turn is in flight
    pub processing: bool,
    /// Book currently framing the conversation
    pub active_book: Option<ActiveBook>,
    /// Message id that owns audio playback, if any
    pub playing_id: Option<u64>,
    /// Last playback-related notice ("" when none)
    pub playback_status: String,
}

/// The session state machine. Generic over the transport so tests can script
/// the wire.
pub struct SessionOrchestrator<T: TurnTransport> {
    transport: T,
    /// Use the streaming endpoint; when off, turns take the one-shot path
    streaming: bool,
    playback: PlaybackController,
    context: ContextTracker,
    messages: Vec<Message>,
    status: String,
    progress: Vec<ProgressStep>,
    processing: bool,
    next_id: u64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    // Kept so publishing can never observe a closed channel
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl<T: TurnTransport> SessionOrchestrator<T> {
    /// Create a session with a seeded welcome message.
    pub fn new(transport: T, playback: PlaybackController, streaming: bool) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let mut session = Self {
            transport,
            streaming,
            playback,
            context: ContextTracker::new(),
            messages: Vec::new(),
            status: String::new(),
            progress: Vec::new(),
            processing: false,
            next_id: 0,
            snapshot_tx,
            snapshot_rx,
        };
        let id = session.next_id();
        session.messages.push(Message::assistant(id, WELCOME_NOTICE));
        session.publish();
        session
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Submit typed input. Whitespace-only text is a no-op, as is submitting
    /// while a turn is already in flight (the UI disables submission, but a
    /// bypassed guard must not corrupt state).
    pub async fn submit_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.processing {
            tracing::warn!("submit_text while a turn is in flight, ignoring");
            return;
        }
        self.process_input(text.to_string(), true).await;
    }

    /// Submit recorded audio: transcribe it, then run the turn with the
    /// transcription as this turn's user message.
    pub async fn submit_audio(&mut self, audio: Vec<u8>) {
        if self.processing {
            tracing::warn!("submit_audio while a turn is in flight, ignoring");
            return;
        }

        self.processing = true;
        self.status = TRANSCRIBING_NOTICE.to_string();
        let temp_id = self.next_id();
        self.messages
            .push(Message::placeholder(temp_id, Sender::User, TRANSCRIBING_NOTICE));
        self.publish();

        match self.transport.transcribe(audio).await {
            Ok(transcription) => {
                let text = transcription.text;
                // Finalize the placeholder in place: same id, real text
                if let Some(msg) = self.messages.iter_mut().find(|m| m.id == temp_id) {
                    msg.text = text.clone();
                    msg.temporary = false;
                }
                self.publish();
                // The transcription is this turn's user message; don't add another
                self.process_input(text, false).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                self.messages.retain(|m| m.id != temp_id);
                let id = self.next_id();
                self.messages.push(Message::system_error(id, TURN_ERROR_NOTICE));
                self.status.clear();
                self.processing = false;
                self.publish();
            }
        }
    }

    /// Explicitly leave book discussion mode.
    pub fn exit_book_mode(&mut self) {
        self.context.exit();
        // Surface the notice unless a turn owns the status line
        if !self.processing {
            self.status = self.context.status().to_string();
        }
        self.publish();
    }

    /// Stop audio playback (the global interrupt).
    pub fn stop_audio(&self) {
        self.playback.stop();
        self.publish();
    }

    /// Clear a finished playback's owning id and republish.
    pub fn poll_playback(&self) {
        self.playback.poll();
        self.publish();
    }

    /// The playback controller handle. The UI thread wires the interrupt key
    /// to its `stop()` so it stays responsive during in-flight turns.
    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    /// Current whole-session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            status: self.status.clone(),
            progress: self.progress.clone(),
            processing: self.processing,
            active_book: self.context.active().cloned(),
            playing_id: self.playback.playing_id(),
            playback_status: self.playback.status(),
        }
    }

    /// Format a message timestamp for display (local HH:MM).
    pub fn format_display_time(ts: DateTime<Utc>) -> String {
        ts.with_timezone(&chrono::Local).format("%H:%M").to_string()
    }

    /// Run one turn: placeholder in, streaming drive, placeholder out.
    async fn process_input(&mut self, text: String, add_user_message: bool) {
        if add_user_message {
            let id = self.next_id();
            self.messages.push(Message::user(id, &text));
        }

        self.processing = true;
        self.status = THINKING_NOTICE.to_string();
        self.progress.clear();
        let placeholder_id = self.next_id();
        self.messages
            .push(Message::placeholder(placeholder_id, Sender::Assistant, THINKING_NOTICE));
        self.publish();

        let outcome = if self.streaming {
            self.drive_turn(&text).await
        } else {
            // One-shot path never fails; transport degrades into an offline notice
            Ok(self.transport.send_turn(&text).await)
        };

        match outcome {
            Ok(reply) => self.complete_turn(placeholder_id, reply).await,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                self.messages.retain(|m| m.id != placeholder_id);
                let id = self.next_id();
                self.messages.push(Message::system_error(id, TURN_ERROR_NOTICE));
                self.status.clear();
                self.progress.clear();
                self.processing = false;
                self.publish();
            }
        }
    }

    /// Await the streaming call, applying intermediate events in arrival
    /// order as they interleave with the terminal result.
    async fn drive_turn(&mut self, text: &str) -> Result<TurnReply> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let turn = self.transport.send_turn_streaming(text, events_tx);
        tokio::pin!(turn);

        loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    apply_stream_event(&mut self.status, &mut self.progress, event);
                    self.publish();
                }
                result = &mut turn => {
                    // Events that raced the terminal are still applied in order
                    while let Ok(event) = events_rx.try_recv() {
                        apply_stream_event(&mut self.status, &mut self.progress, event);
                    }
                    self.publish();
                    return result;
                }
            }
        }
    }

    /// Terminal success: swap placeholder for the final reply, feed the
    /// context tracker, and request playback for non-warning replies.
    async fn complete_turn(&mut self, placeholder_id: u64, reply: TurnReply) {
        let reply_id = self.next_id();
        let function_results = reply.parsed_function_results();

        let mut message = Message::assistant(reply_id, &reply.text);
        message.audio_url = reply.audio_url.clone();
        message.warning = reply.is_warning;
        message.function_results = function_results.clone();

        // One timeline revision: a reader never sees placeholder and final
        // reply coexisting
        self.messages.retain(|m| m.id != placeholder_id);
        self.messages.push(message);

        self.status.clear();
        self.progress.clear();
        self.processing = false;
        self.context.apply(&function_results);
        self.publish();

        if let Some(url) = &reply.audio_url {
            if reply.is_warning {
                tracing::debug!("reply flagged as warning, skipping playback");
            } else {
                self.playback.play(reply_id, url).await;
                self.publish();
            }
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn publish(&self) {
        // The held receiver keeps the channel open
        let _ = self.snapshot_tx.send(self.snapshot());
    }
}

/// Apply one intermediate stream event: status updates the shared status
/// line, progress additionally upserts its step by type.
fn apply_stream_event(status: &mut String, progress: &mut Vec<ProgressStep>, event: StreamEvent) {
    match event {
        StreamEvent::Status(text) => *status = text,
        StreamEvent::Progress {
            status: text,
            step_type,
            icon,
        } => {
            *status = text.clone();
            upsert_step(
                progress,
                ProgressStep {
                    step_type,
                    status: text,
                    icon,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_stream_event_status() {
        let mut status = String::new();
        let mut progress = Vec::new();

        apply_stream_event(
            &mut status,
            &mut progress,
            StreamEvent::Status("Analyzing your request...".to_string()),
        );
        assert_eq!(status, "Analyzing your request...");
        assert!(progress.is_empty());
    }

    #[test]
    fn test_apply_stream_event_progress_upserts() {
        let mut status = String::new();
        let mut progress = Vec::new();

        let event = |text: &str| StreamEvent::Progress {
            status: text.to_string(),
            step_type: "book_search".to_string(),
            icon: None,
        };
        apply_stream_event(&mut status, &mut progress, event("Searching..."));
        apply_stream_event(&mut status, &mut progress, event("Found 3 books"));

        assert_eq!(status, "Found 3 books");
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].status, "Found 3 books");
    }

    #[test]
    fn test_format_display_time() {
        let formatted = SessionOrchestrator::<crate::transport::ChatClient>::format_display_time(
            chrono::Utc::now(),
        );
        assert_eq!(formatted.len(), 5);
        assert_eq!(formatted.as_bytes()[2], b':');
    }
}
