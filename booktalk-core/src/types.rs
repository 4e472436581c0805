//! Core domain types for booktalk
//!
//! These types model one live chat session with the book-companion assistant.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Turn** | One user input and its complete assistant response cycle |
//! | **Message** | One entry in the conversation timeline |
//! | **Placeholder** | A temporary message shown before its final content is known |
//! | **ProgressStep** | One named phase of server-side work during a turn |
//! | **ActiveBook** | The book currently framing the conversation, if any |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::function::FunctionResult;

// ============================================
// Sender
// ============================================

/// Who a timeline message is from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
            Sender::System => "system",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            "system" => Ok(Sender::System),
            _ => Err(format!("unknown sender: {}", s)),
        }
    }
}

// ============================================
// Messages
// ============================================

/// One entry in the conversation timeline.
///
/// Messages are created and mutated only by the session orchestrator. A
/// `temporary` message is always either finalized in place or removed before
/// its owning turn completes.
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique id, monotonically assigned by the orchestrator
    pub id: u64,
    /// Display text
    pub text: String,
    /// Who the message is from
    pub sender: Sender,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// URL of the spoken version of this message, if any
    pub audio_url: Option<String>,
    /// Structured function-call results attached to an assistant reply
    pub function_results: Vec<FunctionResult>,
    /// Placeholder being superseded by a final message
    pub temporary: bool,
    /// Turn-level failure notice
    pub error: bool,
    /// Reply flagged by content moderation
    pub warning: bool,
}

impl Message {
    fn new(id: u64, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            audio_url: None,
            function_results: Vec::new(),
            temporary: false,
            error: false,
            warning: false,
        }
    }

    /// A user message
    pub fn user(id: u64, text: impl Into<String>) -> Self {
        Self::new(id, Sender::User, text)
    }

    /// An assistant message
    pub fn assistant(id: u64, text: impl Into<String>) -> Self {
        Self::new(id, Sender::Assistant, text)
    }

    /// A temporary placeholder from the given sender
    pub fn placeholder(id: u64, sender: Sender, text: impl Into<String>) -> Self {
        let mut msg = Self::new(id, sender, text);
        msg.temporary = true;
        msg
    }

    /// A system error message (failed turn, failed transcription)
    pub fn system_error(id: u64, text: impl Into<String>) -> Self {
        let mut msg = Self::new(id, Sender::System, text);
        msg.error = true;
        msg
    }
}

// ============================================
// Progress steps
// ============================================

/// One named phase of server-side work during a turn.
///
/// `step_type` is the de-duplication key: the active turn's progress list
/// holds at most one step per type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    /// Phase identifier (e.g., "book_search", "book_recommendation")
    pub step_type: String,
    /// Latest human-readable status for this phase
    pub status: String,
    /// Optional icon sent by the server
    pub icon: Option<String>,
}

/// Upsert a step by type: replace in place if a step of the same type exists
/// (preserving the order of other steps), else append.
pub fn upsert_step(steps: &mut Vec<ProgressStep>, step: ProgressStep) {
    match steps.iter_mut().find(|s| s.step_type == step.step_type) {
        Some(existing) => *existing = step,
        None => steps.push(step),
    }
}

// ============================================
// Wire types
// ============================================

/// A resolved assistant reply, for both the streaming and non-streaming paths.
///
/// Wire shape: `{text, audio_url?, function_results?, is_warning?}`. The
/// server also sends a pre-rendered `html` field which we ignore.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TurnReply {
    /// Reply text
    #[serde(default)]
    pub text: String,
    /// URL of the spoken reply (may be relative to the server)
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Raw function-call results; parsed via [`FunctionResult::parse`]
    #[serde(default)]
    pub function_results: Vec<crate::function::RawFunctionResult>,
    /// Reply flagged by content moderation
    #[serde(default)]
    pub is_warning: bool,
}

impl TurnReply {
    /// Parse the raw function results into their tagged variants.
    pub fn parsed_function_results(&self) -> Vec<FunctionResult> {
        self.function_results
            .iter()
            .map(FunctionResult::parse)
            .collect()
    }
}

/// Transcription response from the speech-to-text endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    /// Transcribed text
    pub text: String,
}

/// An intermediate event delivered while a streaming turn is in flight.
///
/// Terminal outcomes (`complete`/`error`) are not stream events; they resolve
/// the streaming call itself.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// `status` event: update the shared status line
    Status(String),
    /// `progress` event: upsert a progress step and update the status line
    Progress {
        status: String,
        step_type: String,
        icon: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(step_type: &str, status: &str) -> ProgressStep {
        ProgressStep {
            step_type: step_type.to_string(),
            status: status.to_string(),
            icon: None,
        }
    }

    #[test]
    fn test_upsert_appends_new_types() {
        let mut steps = Vec::new();
        upsert_step(&mut steps, step("book_search", "Searching..."));
        upsert_step(&mut steps, step("book_content", "Fetching..."));
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_type, "book_search");
        assert_eq!(steps[1].step_type, "book_content");
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut steps = Vec::new();
        upsert_step(&mut steps, step("book_search", "Searching..."));
        upsert_step(&mut steps, step("book_content", "Fetching..."));
        upsert_step(&mut steps, step("book_search", "Found 3 books"));

        assert_eq!(steps.len(), 2);
        // Order preserved, latest text wins
        assert_eq!(steps[0].step_type, "book_search");
        assert_eq!(steps[0].status, "Found 3 books");
        assert_eq!(steps[1].step_type, "book_content");
    }

    #[test]
    fn test_placeholder_flags() {
        let msg = Message::placeholder(1, Sender::Assistant, "Thinking...");
        assert!(msg.temporary);
        assert!(!msg.error);

        let msg = Message::system_error(2, "boom");
        assert!(msg.error);
        assert!(!msg.temporary);
    }

    #[test]
    fn test_turn_reply_defaults() {
        let reply: TurnReply = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(reply.text, "hi");
        assert!(reply.audio_url.is_none());
        assert!(reply.function_results.is_empty());
        assert!(!reply.is_warning);
    }
}
