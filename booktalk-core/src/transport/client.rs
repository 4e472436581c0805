//! HTTP client for the assistant service
//!
//! Endpoints:
//! - `POST {base}/assistant-chat` - one-shot turn
//! - `GET  {base}/assistant-chat-stream?message=..&language=..` - SSE turn
//! - `POST {base}/speech-to-text` - multipart transcription

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::types::{StreamEvent, Transcription, TurnReply};

use super::sse::SseParser;

/// Stand-in reply used when the non-streaming path cannot reach the service.
/// The session must keep working against a dead server, so this is a visible
/// notice rather than a propagated error.
pub const OFFLINE_NOTICE: &str =
    "I'm sorry, I'm having trouble connecting to the server right now. Please try again in a moment.";

/// Seam between the session orchestrator and the wire.
///
/// Implemented by [`ChatClient`] in production and by scripted mocks in tests.
#[allow(async_fn_in_trait)]
pub trait TurnTransport {
    /// Non-streaming turn. Never fails: transport errors degrade into an
    /// offline-notice reply.
    async fn send_turn(&self, text: &str) -> TurnReply;

    /// Streaming turn. Intermediate events are sent on `events` in arrival
    /// order; the returned future resolves exactly once with the terminal
    /// result.
    async fn send_turn_streaming(
        &self,
        text: &str,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<TurnReply>;

    /// One-shot transcription of recorded audio. No fallback text on failure.
    async fn transcribe(&self, audio: Vec<u8>) -> Result<Transcription>;
}

/// HTTP client for the assistant API
pub struct ChatClient {
    config: ServerConfig,
    http_client: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        // Streaming turns must outlive the request timeout, so the client is
        // built without one; non-streaming calls set a per-request timeout.
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            base_url,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Resolve an audio URL the server handed back, which may be relative
    /// (`/api/audio/xyz.mp3`) or already absolute.
    pub fn resolve_audio_url(base_url: &str, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        // Server-relative paths resolve against the host, not the api prefix
        let host = base_url.trim_end_matches('/').trim_end_matches("/api");
        format!("{}{}", host, url)
    }

    async fn try_send_turn(&self, text: &str) -> Result<TurnReply> {
        let url = format!("{}/assistant-chat", self.base_url);

        let body = serde_json::json!({
            "message": text,
            "language": self.config.language,
        });

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Transport(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("failed to parse response: {}", e)))
    }

    /// Dispatch one SSE frame, updating the terminal bookkeeping.
    ///
    /// `result` holds the last `complete` payload; `saw_error` records an
    /// `error` event seen before any `complete`.
    fn handle_frame(
        frame: super::sse::SseFrame,
        events: &UnboundedSender<StreamEvent>,
        result: &mut Option<TurnReply>,
        saw_error: &mut bool,
    ) {
        match frame.event.as_str() {
            "status" => {
                if let Some(status) = parse_status(&frame.data) {
                    // Receiver gone means the turn was dropped; nothing to do
                    let _ = events.send(StreamEvent::Status(status));
                }
            }
            "progress" => {
                if let Some(event) = parse_progress(&frame.data) {
                    let _ = events.send(event);
                }
            }
            "complete" => match serde_json::from_str::<TurnReply>(&frame.data) {
                Ok(reply) => *result = Some(reply),
                Err(e) => {
                    tracing::warn!(error = %e, "unparseable complete payload");
                }
            },
            "error" => {
                // Last-good-result-wins: an error after a complete is ignored
                if result.is_none() {
                    tracing::warn!(data = %frame.data, "stream reported an error");
                    *saw_error = true;
                }
            }
            other => {
                tracing::debug!(event = %other, "ignoring unknown stream event");
            }
        }
    }
}

impl TurnTransport for ChatClient {
    async fn send_turn(&self, text: &str) -> TurnReply {
        match self.try_send_turn(text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "turn request failed, substituting offline notice");
                TurnReply {
                    text: OFFLINE_NOTICE.to_string(),
                    ..Default::default()
                }
            }
        }
    }

    async fn send_turn_streaming(
        &self,
        text: &str,
        events: UnboundedSender<StreamEvent>,
    ) -> Result<TurnReply> {
        use futures_util::StreamExt;

        let url = format!(
            "{}/assistant-chat-stream?message={}&language={}",
            self.base_url,
            urlencoding::encode(text),
            urlencoding::encode(&self.config.language)
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("API error ({})", status)));
        }

        let mut parser = SseParser::new();
        let mut result: Option<TurnReply> = None;
        let mut saw_error = false;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Transport(format!("stream read failed: {}", e)))?;
            for frame in parser.push(&chunk) {
                Self::handle_frame(frame, &events, &mut result, &mut saw_error);
            }
        }

        // Closure without a prior complete is a failure either way; an
        // explicit error event just names the culprit better.
        match result {
            Some(reply) => Ok(reply),
            None if saw_error => Err(Error::Transport(
                "assistant reported an error during the turn".to_string(),
            )),
            None => Err(Error::StreamInterrupted),
        }
    }

    async fn transcribe(&self, audio: Vec<u8>) -> Result<Transcription> {
        let url = format!("{}/speech-to-text", self.base_url);

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("recording.webm")
            .mime_str("audio/webm")
            .map_err(|e| Error::Transcription(format!("invalid audio part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Transcription(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::Transcription(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transcription(format!("failed to parse response: {}", e)))
    }
}

/// `status` payload: `{"status": "Thinking..."}`
fn parse_status(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    value.get("status")?.as_str().map(str::to_string)
}

/// `progress` payload: `{"status": "...", "progress": {"type": "...", "icon": "..."}}`
fn parse_progress(data: &str) -> Option<StreamEvent> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let status = value.get("status")?.as_str()?.to_string();
    let progress = value.get("progress")?;
    Some(StreamEvent::Progress {
        status,
        step_type: progress.get("type")?.as_str()?.to_string(),
        icon: progress
            .get("icon")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::sse::SseFrame;
    use tokio::sync::mpsc;

    #[test]
    fn test_client_requires_valid_config() {
        let config = ServerConfig {
            base_url: "not-a-url".to_string(),
            ..Default::default()
        };
        assert!(ChatClient::new(config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        assert!(ChatClient::new(ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_resolve_audio_url() {
        let base = "http://localhost:8000/api";
        assert_eq!(
            ChatClient::resolve_audio_url(base, "/api/audio/x.mp3"),
            "http://localhost:8000/api/audio/x.mp3"
        );
        assert_eq!(
            ChatClient::resolve_audio_url(base, "https://cdn.example.com/x.mp3"),
            "https://cdn.example.com/x.mp3"
        );
    }

    #[test]
    fn test_parse_status_and_progress() {
        assert_eq!(
            parse_status(r#"{"status": "Thinking..."}"#).as_deref(),
            Some("Thinking...")
        );
        assert!(parse_status("not json").is_none());

        let event = parse_progress(
            r#"{"status": "Processing book_search...", "progress": {"type": "book_search", "icon": "S"}}"#,
        );
        match event {
            Some(StreamEvent::Progress {
                status,
                step_type,
                icon,
            }) => {
                assert_eq!(status, "Processing book_search...");
                assert_eq!(step_type, "book_search");
                assert_eq!(icon.as_deref(), Some("S"));
            }
            other => panic!("expected progress, got {:?}", other),
        }
    }

    fn frame(event: &str, data: &str) -> SseFrame {
        SseFrame {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_error_after_complete_keeps_result() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut result = None;
        let mut saw_error = false;

        ChatClient::handle_frame(
            frame("complete", r#"{"text": "done"}"#),
            &tx,
            &mut result,
            &mut saw_error,
        );
        ChatClient::handle_frame(frame("error", "{}"), &tx, &mut result, &mut saw_error);

        assert_eq!(result.as_ref().map(|r| r.text.as_str()), Some("done"));
        assert!(!saw_error);
    }

    #[test]
    fn test_error_without_complete_is_recorded() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut result = None;
        let mut saw_error = false;

        ChatClient::handle_frame(frame("error", "{}"), &tx, &mut result, &mut saw_error);

        assert!(result.is_none());
        assert!(saw_error);
    }

    #[tokio::test]
    async fn test_status_frames_forwarded_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut result = None;
        let mut saw_error = false;

        ChatClient::handle_frame(
            frame("status", r#"{"status": "a"}"#),
            &tx,
            &mut result,
            &mut saw_error,
        );
        ChatClient::handle_frame(
            frame("status", r#"{"status": "b"}"#),
            &tx,
            &mut result,
            &mut saw_error,
        );

        match rx.recv().await {
            Some(StreamEvent::Status(s)) => assert_eq!(s, "a"),
            other => panic!("expected status, got {:?}", other),
        }
        match rx.recv().await {
            Some(StreamEvent::Status(s)) => assert_eq!(s, "b"),
            other => panic!("expected status, got {:?}", other),
        }
    }
}
