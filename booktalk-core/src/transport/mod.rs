//! Transport client for the book-companion assistant service
//!
//! This module owns the wire contract with the backend: one-shot chat turns,
//! streaming turns over server-sent events, and audio transcription.
//!
//! ## Failure policy
//!
//! - Non-streaming turns never fail: transport errors are swallowed into a
//!   fixed offline-notice reply so the session survives a dead server.
//! - Streaming turns resolve exactly once. A stream that closes without a
//!   `complete` event is a [`crate::Error::StreamInterrupted`]. If an `error`
//!   event arrives after a `complete`, the already-received result wins.
//! - Transcription rejects on failure; a failed transcription must never
//!   silently become a different user message.

mod client;
mod sse;

pub use client::{ChatClient, TurnTransport, OFFLINE_NOTICE};
pub use sse::{SseFrame, SseParser};
