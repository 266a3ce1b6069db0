//! Core `VoiceBackend` trait and supporting types.
//!
//! # Overview
//!
//! [`VoiceBackend`] is the transport abstraction the session core drives.
//! It is object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn VoiceBackend>`.
//!
//! [`crate::backend::NatsBackend`] is the production implementation.
//!
//! [`MockBackend`] (available under `#[cfg(test)]`) is a scriptable stub —
//! useful for unit-testing the session orchestrator without a running
//! speech service.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// All errors that can arise from the backend subsystem.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The transport connection could not be established.
    #[error("failed to connect to speech service: {0}")]
    Connect(String),

    /// An operation was attempted while disconnected.
    #[error("not connected to the speech service")]
    NotConnected,

    /// The transport dropped or a publish/request failed in flight.
    #[error("transport error: {0}")]
    Transport(String),

    /// A request did not complete within the configured timeout.
    #[error("speech service request timed out")]
    Timeout,

    /// The service answered but refused the request.
    #[error("request rejected by the speech service: {0}")]
    Rejected(String),

    /// The service reply could not be parsed as expected JSON.
    #[error("failed to parse speech service response: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// Parameters for opening a voice session.
#[derive(Debug, Clone)]
pub struct VoiceSessionOptions {
    /// ISO-639-1 language code, or `"auto"`.
    pub language: String,
    /// PCM sample rate the client will stream at, in Hz.
    pub sample_rate: u32,
}

impl Default for VoiceSessionOptions {
    fn default() -> Self {
        Self {
            language: "en".into(),
            sample_rate: 16_000,
        }
    }
}

/// A transcript update pushed by the service during a voice session.
#[derive(Debug, Clone)]
pub struct TranscriptUpdate {
    pub text: String,
    /// `false` for interim results that may still be revised.
    pub is_final: bool,
}

/// Live voice session returned by [`VoiceBackend::start_voice_session`].
///
/// Transcript updates arrive on `transcripts` until the session ends; the
/// channel closes when the service stops publishing or the backend
/// disconnects.
#[derive(Debug)]
pub struct VoiceSessionHandle {
    pub session_id: String,
    pub transcripts: mpsc::Receiver<TranscriptUpdate>,
}

/// Result of a [`VoiceBackend::request_command`] round trip.
///
/// `command_id == None` means the service found no command intent in the
/// transcript.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command_id: Option<String>,
    /// Trailing transcript text after the matched phrase.
    pub args: String,
}

/// Synthesized speech returned by [`VoiceBackend::synthesize`].
#[derive(Debug, Clone)]
pub struct SynthesizedSpeech {
    /// Raw 16-bit little-endian PCM.
    pub audio: Vec<u8>,
    pub sample_rate: u32,
}

// ---------------------------------------------------------------------------
// VoiceBackend trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to the hosted speech service.
///
/// Implementations must be `Send + Sync` so that they can be held behind an
/// `Arc<dyn VoiceBackend>` and called from any task.
///
/// # Contract
///
/// - At most one voice session is open per backend at a time; a second
///   `start_voice_session` without an intervening stop returns
///   [`BackendError::Rejected`].
/// - `send_audio` outside an open session returns
///   [`BackendError::NotConnected`].
/// - `disconnect` is idempotent; all operations after it (except
///   `is_connected`) return [`BackendError::NotConnected`].
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Open a voice session and begin receiving transcript updates.
    async fn start_voice_session(
        &self,
        opts: VoiceSessionOptions,
    ) -> Result<VoiceSessionHandle, BackendError>;

    /// Stream one chunk of captured audio into the open session.
    ///
    /// `last` marks the end of the utterance; the service finalises the
    /// transcript after receiving it.
    async fn send_audio(&self, samples: &[f32], last: bool) -> Result<(), BackendError>;

    /// Close the open voice session, asking the service for a final
    /// transcript. No-op when no session is open.
    async fn stop_voice_session(&self) -> Result<(), BackendError>;

    /// Rewrite `text` according to a natural-language `instruction`.
    async fn request_edit_text(
        &self,
        text: &str,
        instruction: &str,
    ) -> Result<String, BackendError>;

    /// Resolve a command intent from a transcript.
    async fn request_command(&self, transcript: &str) -> Result<CommandOutcome, BackendError>;

    /// Synthesize speech for `text` with the given voice.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedSpeech, BackendError>;

    /// Tear down the transport connection. Idempotent.
    async fn disconnect(&self) -> Result<(), BackendError>;

    /// Cheap connection-state query.
    fn is_connected(&self) -> bool;
}

// Compile-time assertion: Box<dyn VoiceBackend> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn VoiceBackend>) {}
};

// ---------------------------------------------------------------------------
// MockBackend  (test-only)
// ---------------------------------------------------------------------------

/// A scriptable test double that never touches the network.
///
/// Configure the transcript updates a session should deliver, then inspect
/// the calls the session core made.
#[cfg(test)]
pub struct MockBackend {
    /// Updates delivered on the transcript channel of every session.
    scripted: Vec<TranscriptUpdate>,
    /// When `true`, `start_voice_session` fails with `Connect`.
    fail_start: bool,
    /// Scripted `request_edit_text` reply.
    edit_reply: Result<String, BackendError>,
    /// Scripted `request_command` reply.
    command_reply: Result<CommandOutcome, BackendError>,
    connected: std::sync::atomic::AtomicBool,
    /// Number of `send_audio` calls observed.
    pub frames_sent: std::sync::atomic::AtomicUsize,
    /// Number of `stop_voice_session` calls observed.
    pub stops: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockBackend {
    /// A backend whose sessions deliver `scripted` and whose requests all
    /// succeed with fixed replies.
    pub fn with_transcripts(scripted: Vec<TranscriptUpdate>) -> Self {
        Self {
            scripted,
            fail_start: false,
            edit_reply: Ok("edited".into()),
            command_reply: Ok(CommandOutcome {
                command_id: None,
                args: String::new(),
            }),
            connected: std::sync::atomic::AtomicBool::new(true),
            frames_sent: std::sync::atomic::AtomicUsize::new(0),
            stops: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A backend that refuses to open sessions.
    pub fn failing() -> Self {
        let mut mock = Self::with_transcripts(Vec::new());
        mock.fail_start = true;
        mock
    }

    /// Override the `request_edit_text` reply.
    pub fn with_edit_reply(mut self, reply: Result<String, BackendError>) -> Self {
        self.edit_reply = reply;
        self
    }

    /// Override the `request_command` reply.
    pub fn with_command_reply(mut self, reply: Result<CommandOutcome, BackendError>) -> Self {
        self.command_reply = reply;
        self
    }
}

#[cfg(test)]
#[async_trait]
impl VoiceBackend for MockBackend {
    async fn start_voice_session(
        &self,
        _opts: VoiceSessionOptions,
    ) -> Result<VoiceSessionHandle, BackendError> {
        use std::sync::atomic::Ordering;

        if self.fail_start {
            return Err(BackendError::Connect("scripted failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);

        // Preload all scripted updates; capacity covers them so send() never
        // blocks before the receiver is polled.
        let (tx, rx) = mpsc::channel(self.scripted.len().max(1));
        for update in &self.scripted {
            let _ = tx.send(update.clone()).await;
        }

        Ok(VoiceSessionHandle {
            session_id: "mock-session".into(),
            transcripts: rx,
        })
    }

    async fn send_audio(&self, _samples: &[f32], _last: bool) -> Result<(), BackendError> {
        use std::sync::atomic::Ordering;
        if !self.is_connected() {
            return Err(BackendError::NotConnected);
        }
        self.frames_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_voice_session(&self) -> Result<(), BackendError> {
        use std::sync::atomic::Ordering;
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_edit_text(
        &self,
        _text: &str,
        _instruction: &str,
    ) -> Result<String, BackendError> {
        self.edit_reply.clone()
    }

    async fn request_command(&self, _transcript: &str) -> Result<CommandOutcome, BackendError> {
        self.command_reply.clone()
    }

    async fn synthesize(
        &self,
        _text: &str,
        _voice_id: &str,
    ) -> Result<SynthesizedSpeech, BackendError> {
        Ok(SynthesizedSpeech {
            audio: vec![0_u8; 320],
            sample_rate: 24_000,
        })
    }

    async fn disconnect(&self) -> Result<(), BackendError> {
        use std::sync::atomic::Ordering;
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_delivers_scripted_transcripts() {
        let backend = MockBackend::with_transcripts(vec![
            TranscriptUpdate {
                text: "hel".into(),
                is_final: false,
            },
            TranscriptUpdate {
                text: "hello".into(),
                is_final: true,
            },
        ]);

        let mut handle = backend
            .start_voice_session(VoiceSessionOptions::default())
            .await
            .unwrap();

        let first = handle.transcripts.recv().await.unwrap();
        assert!(!first.is_final);
        let second = handle.transcripts.recv().await.unwrap();
        assert!(second.is_final);
        assert_eq!(second.text, "hello");
    }

    #[tokio::test]
    async fn mock_failing_returns_connect_error() {
        let backend = MockBackend::failing();
        let err = backend
            .start_voice_session(VoiceSessionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Connect(_)));
    }

    #[tokio::test]
    async fn mock_counts_frames_and_stops() {
        use std::sync::atomic::Ordering;

        let backend = MockBackend::with_transcripts(Vec::new());
        backend.send_audio(&[0.0; 160], false).await.unwrap();
        backend.send_audio(&[], true).await.unwrap();
        backend.stop_voice_session().await.unwrap();

        assert_eq!(backend.frames_sent.load(Ordering::SeqCst), 2);
        assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mock_send_audio_after_disconnect_is_not_connected() {
        let backend = MockBackend::with_transcripts(Vec::new());
        backend.disconnect().await.unwrap();
        assert!(!backend.is_connected());

        let err = backend.send_audio(&[0.0; 16], false).await.unwrap_err();
        assert!(matches!(err, BackendError::NotConnected));
    }

    /// If this test compiles, the trait is object-safe.
    #[tokio::test]
    async fn box_dyn_voice_backend_compiles() {
        let backend: Box<dyn VoiceBackend> = Box::new(MockBackend::with_transcripts(Vec::new()));
        let _ = backend.is_connected();
    }

    #[test]
    fn backend_error_display_mentions_the_service() {
        let e = BackendError::Rejected("quota exceeded".into());
        assert!(e.to_string().contains("quota exceeded"));
    }
}
