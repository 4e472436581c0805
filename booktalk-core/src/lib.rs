//! # booktalk-core
//!
//! Core library for booktalk - a chat client for a book-companion assistant.
//!
//! This library provides:
//! - The session orchestrator driving one live conversation
//! - The transport client (one-shot turns, SSE streaming turns, transcription)
//! - The audio playback controller (single playback slot)
//! - The active-book context tracker
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! User input (typed or transcribed) starts a turn; the transport streams
//! progress events which the orchestrator applies in arrival order; on
//! completion the final reply lands in the timeline, its function-call
//! results feed the context tracker, and playback is requested for spoken
//! replies. Presentation layers consume read-only [`SessionSnapshot`]s and
//! drive the session through four operations: submit text, submit audio,
//! exit book mode, stop audio.
//!
//! ## Example
//!
//! ```rust,no_run
//! use booktalk_core::{ChatClient, Config, NullSink, PlaybackController, SessionOrchestrator};
//!
//! # async fn run() -> booktalk_core::Result<()> {
//! let config = Config::load()?;
//! let transport = ChatClient::new(config.server.clone())?;
//! let playback = PlaybackController::new(Box::new(NullSink), config.server.base_url.clone());
//! let mut session = SessionOrchestrator::new(transport, playback, config.server.streaming);
//! session.submit_text("recommend me something spooky").await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use audio::{AudioSink, NullSink, PlaybackController, RodioSink};
pub use config::Config;
pub use context::{ActiveBook, ContextTracker};
pub use error::{Error, Result};
pub use function::{FunctionResult, MatchedBook, RawFunctionResult, RecommendedBook};
pub use session::{SessionOrchestrator, SessionSnapshot};
pub use transport::{ChatClient, TurnTransport};
pub use types::*;

// Public modules
pub mod audio;
pub mod config;
pub mod context;
pub mod error;
pub mod function;
pub mod logging;
pub mod session;
pub mod transport;
pub mod types;
