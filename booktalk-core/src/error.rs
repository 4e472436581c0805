//! Error types for booktalk-core

use thiserror::Error;

/// Main error type for the booktalk-core library
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/API error
    #[error("transport error: {0}")]
    Transport(String),

    /// Streaming turn closed without a terminal result
    #[error("stream closed before a result was received")]
    StreamInterrupted,

    /// Speech-to-text request failed
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Audio playback error
    #[error("playback error: {0}")]
    Playback(String),
}

/// Result type alias for booktalk-core
pub type Result<T> = std::result::Result<T, Error>;
