//! Audio playback controller
//!
//! Owns the session's single playback slot: at most one audio source is ever
//! active, and starting a new one fully stops any prior one first. The
//! controller is a cloneable handle over shared state so the UI thread can
//! call [`PlaybackController::stop`] directly for the interrupt key while a
//! chat turn is in flight.
//!
//! Playback failures are recovered locally (a status notice, state back to
//! stopped) and never reach the message timeline.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::transport::ChatClient;

/// Status notice shown when an audio source cannot be fetched or decoded.
pub const PLAYBACK_ERROR_NOTICE: &str = "Audio playback failed.";

/// Audio output seam.
///
/// [`RodioSink`] in production, [`NullSink`] when audio is disabled, counting
/// fakes in tests.
pub trait AudioSink: Send + Sync {
    /// Start playing the given encoded audio, replacing any current source.
    fn play(&self, data: Vec<u8>) -> Result<()>;

    /// Stop and discard the current source. Safe when nothing is playing.
    fn stop(&self);

    /// True once the current source has run to completion (or none exists).
    fn is_finished(&self) -> bool;
}

/// rodio-backed sink. A fresh `rodio::Sink` is created per source from the
/// output stream handle; the `OutputStream` itself lives on the main thread.
pub struct RodioSink {
    handle: rodio::OutputStreamHandle,
    current: Mutex<Option<rodio::Sink>>,
}

impl RodioSink {
    pub fn new(handle: rodio::OutputStreamHandle) -> Self {
        Self {
            handle,
            current: Mutex::new(None),
        }
    }
}

impl AudioSink for RodioSink {
    fn play(&self, data: Vec<u8>) -> Result<()> {
        let source = rodio::Decoder::new(Cursor::new(data))
            .map_err(|e| Error::Playback(format!("decode failed: {}", e)))?;
        let sink = rodio::Sink::try_new(&self.handle)
            .map_err(|e| Error::Playback(format!("output unavailable: {}", e)))?;
        sink.append(source);

        let mut current = self.current.lock().expect("sink lock poisoned");
        if let Some(old) = current.take() {
            old.stop();
        }
        *current = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        let mut current = self.current.lock().expect("sink lock poisoned");
        if let Some(sink) = current.take() {
            sink.stop();
        }
    }

    fn is_finished(&self) -> bool {
        let current = self.current.lock().expect("sink lock poisoned");
        current.as_ref().map_or(true, |sink| sink.empty())
    }
}

/// No-op sink used when audio is disabled in the config.
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _data: Vec<u8>) -> Result<()> {
        Ok(())
    }

    fn stop(&self) {}

    fn is_finished(&self) -> bool {
        true
    }
}

struct PlaybackShared {
    sink: Box<dyn AudioSink>,
    /// Message id owning the playback slot, if any
    playing: Mutex<Option<u64>>,
    /// Last playback-related notice for the status line
    status: Mutex<String>,
}

/// Cloneable handle to the session's single playback slot.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<PlaybackShared>,
    http_client: reqwest::Client,
    base_url: String,
}

impl PlaybackController {
    /// Create a controller over the given sink. `base_url` is the assistant
    /// API base used to resolve relative audio URLs.
    pub fn new(sink: Box<dyn AudioSink>, base_url: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(PlaybackShared {
                sink,
                playing: Mutex::new(None),
                status: Mutex::new(String::new()),
            }),
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Fetch and play the audio for a message. Failures set a status notice
    /// and leave the slot stopped; they are never escalated to the caller.
    pub async fn play(&self, message_id: u64, url: &str) {
        let full_url = ChatClient::resolve_audio_url(&self.base_url, url);

        let bytes = match self.fetch(&full_url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %full_url, error = %e, "failed to fetch audio");
                self.set_status(PLAYBACK_ERROR_NOTICE);
                return;
            }
        };

        self.start(message_id, bytes);
    }

    /// Hand already-fetched bytes to the sink. Split out from [`Self::play`]
    /// so the slot logic is testable without a server.
    pub fn start(&self, message_id: u64, data: Vec<u8>) {
        // At-most-one source: a new start always fully stops the old one
        if self.playing_id().is_some() {
            self.stop();
        }

        match self.shared.sink.play(data) {
            Ok(()) => {
                *self.shared.playing.lock().expect("playback lock poisoned") = Some(message_id);
                self.set_status("");
                tracing::debug!(message_id, "audio playback started");
            }
            Err(e) => {
                tracing::warn!(message_id, error = %e, "audio playback failed to start");
                self.set_status(PLAYBACK_ERROR_NOTICE);
            }
        }
    }

    /// Stop playback and clear the owning message id. Safe to call from any
    /// thread and when already stopped.
    pub fn stop(&self) {
        self.shared.sink.stop();
        *self.shared.playing.lock().expect("playback lock poisoned") = None;
    }

    /// Clear the owning id once the sink reports completion, so the UI never
    /// shows a stale playing indicator.
    pub fn poll(&self) {
        let mut playing = self.shared.playing.lock().expect("playback lock poisoned");
        if playing.is_some() && self.shared.sink.is_finished() {
            *playing = None;
        }
    }

    /// Message id currently owning the playback slot
    pub fn playing_id(&self) -> Option<u64> {
        *self.shared.playing.lock().expect("playback lock poisoned")
    }

    /// Last playback-related status notice (empty when none)
    pub fn status(&self) -> String {
        self.shared.status.lock().expect("status lock poisoned").clone()
    }

    fn set_status(&self, status: &str) {
        *self.shared.status.lock().expect("status lock poisoned") = status.to_string();
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Playback(format!("audio fetch failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Playback(format!("audio fetch failed ({})", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Playback(format!("audio read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Sink that records calls and reports a controllable finished flag.
    struct CountingSink {
        plays: AtomicUsize,
        stops: AtomicUsize,
        finished: AtomicBool,
        fail_play: bool,
    }

    impl CountingSink {
        fn new(fail_play: bool) -> Arc<Self> {
            Arc::new(Self {
                plays: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                finished: AtomicBool::new(false),
                fail_play,
            })
        }
    }

    impl AudioSink for Arc<CountingSink> {
        fn play(&self, _data: Vec<u8>) -> Result<()> {
            if self.fail_play {
                return Err(Error::Playback("decode failed".to_string()));
            }
            self.plays.fetch_add(1, Ordering::SeqCst);
            self.finished.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }
    }

    fn controller(sink: Arc<CountingSink>) -> PlaybackController {
        PlaybackController::new(Box::new(sink), "http://localhost:8000/api")
    }

    #[test]
    fn test_new_source_stops_prior_one() {
        let sink = CountingSink::new(false);
        let playback = controller(sink.clone());

        playback.start(1, vec![0u8; 4]);
        assert_eq!(playback.playing_id(), Some(1));

        playback.start(2, vec![0u8; 4]);
        assert_eq!(playback.playing_id(), Some(2));
        // B started only after A was fully stopped
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
        assert_eq!(sink.plays.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_start_stays_stopped_with_notice() {
        let sink = CountingSink::new(true);
        let playback = controller(sink);

        playback.start(1, vec![0u8; 4]);
        assert_eq!(playback.playing_id(), None);
        assert_eq!(playback.status(), PLAYBACK_ERROR_NOTICE);
    }

    #[test]
    fn test_stop_is_unconditional_and_idempotent() {
        let sink = CountingSink::new(false);
        let playback = controller(sink.clone());

        playback.stop();
        playback.start(1, vec![0u8; 4]);
        playback.stop();
        playback.stop();

        assert_eq!(playback.playing_id(), None);
        assert_eq!(sink.stops.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_poll_clears_finished_playback() {
        let sink = CountingSink::new(false);
        let playback = controller(sink.clone());

        playback.start(1, vec![0u8; 4]);
        playback.poll();
        assert_eq!(playback.playing_id(), Some(1));

        sink.finished.store(true, Ordering::SeqCst);
        playback.poll();
        assert_eq!(playback.playing_id(), None);
    }

    #[test]
    fn test_successful_start_clears_stale_notice() {
        let sink = CountingSink::new(false);
        let playback = controller(sink);

        playback.set_status(PLAYBACK_ERROR_NOTICE);
        playback.start(1, vec![0u8; 4]);
        assert_eq!(playback.status(), "");
    }
}
