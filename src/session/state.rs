//! Session state machine and shared status snapshot.
//!
//! [`SessionState`] drives the dictation lifecycle. Consumers that need
//! current state without subscribing to the event stream read it via
//! [`SharedStatus`].
//!
//! [`SessionStatus`] is the single source of truth for everything a widget
//! layer needs: current lifecycle phase, last final transcript, live partial
//! transcript, input levels, recorded seconds, and any error message.
//!
//! [`SharedStatus`] is a type alias for `Arc<Mutex<SessionStatus>>` — cheap
//! to clone and safe to share across threads.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// States of the voice-dictation session.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──start──▶ Connecting ──backend ready──▶ Recording
/// Recording ──stop / max duration──▶ Processing
/// Processing ──final transcript──▶ Idle
/// any state ──fatal error──▶ Error
/// Error / Idle ──start──▶ Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No voice session is open.
    Idle,

    /// A backend voice session is being opened.
    Connecting,

    /// Microphone audio is streaming to the speech service.
    Recording,

    /// The utterance is complete; waiting for the final transcript.
    Processing,

    /// A recoverable error occurred. The session returns to `Connecting`
    /// on the next start.
    Error,
}

impl SessionState {
    /// Returns `true` while a voice session is open or being opened.
    ///
    /// Widget layers use this to gate the record button.
    ///
    /// ```
    /// use speechos::session::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_active());
    /// assert!(SessionState::Connecting.is_active());
    /// assert!(SessionState::Recording.is_active());
    /// assert!(SessionState::Processing.is_active());
    /// assert!(!SessionState::Error.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Recording | SessionState::Processing
        )
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Recording => "Recording",
            SessionState::Processing => "Processing",
            SessionState::Error => "Error",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Shared session snapshot — the single source of truth for polling
/// consumers.
///
/// Held behind [`SharedStatus`] (`Arc<Mutex<SessionStatus>>`). The session
/// orchestrator mutates it; widget layers read it on demand.
#[derive(Debug, Default)]
pub struct SessionStatus {
    /// Current lifecycle phase.
    pub state: SessionState,

    /// The most recent final transcript.
    ///
    /// `None` until at least one utterance has completed.
    pub last_transcript: Option<String>,

    /// Interim transcript of the in-flight utterance.
    ///
    /// `None` outside of `Recording`/`Processing`.
    pub partial_transcript: Option<String>,

    /// Latest input-level bars for the mic visualization, each in `[0, 1]`.
    pub levels: Vec<f32>,

    /// Error message to display when `state == SessionState::Error`.
    pub error_message: Option<String>,

    /// Seconds of audio streamed in the current (or last) utterance.
    pub recorded_secs: f32,
}

// ---------------------------------------------------------------------------
// SharedStatus
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionStatus`].
///
/// Cheap to clone (`Arc` clone). Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedStatus = Arc<Mutex<SessionStatus>>;

/// Construct a new [`SharedStatus`] wrapping a default [`SessionStatus`].
pub fn new_shared_status() -> SharedStatus {
    Arc::new(Mutex::new(SessionStatus::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- SessionState::is_active ---

    #[test]
    fn idle_is_not_active() {
        assert!(!SessionState::Idle.is_active());
    }

    #[test]
    fn connecting_recording_processing_are_active() {
        assert!(SessionState::Connecting.is_active());
        assert!(SessionState::Recording.is_active());
        assert!(SessionState::Processing.is_active());
    }

    #[test]
    fn error_is_not_active() {
        assert!(!SessionState::Error.is_active());
    }

    // ---- SessionState::label ---

    #[test]
    fn labels_are_stable() {
        assert_eq!(SessionState::Idle.label(), "Idle");
        assert_eq!(SessionState::Connecting.label(), "Connecting");
        assert_eq!(SessionState::Recording.label(), "Recording");
        assert_eq!(SessionState::Processing.label(), "Processing");
        assert_eq!(SessionState::Error.label(), "Error");
    }

    // ---- Default ---

    #[test]
    fn default_state_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    // ---- SessionStatus / SharedStatus ---

    #[test]
    fn default_status_is_empty_idle() {
        let status = SessionStatus::default();
        assert_eq!(status.state, SessionState::Idle);
        assert!(status.last_transcript.is_none());
        assert!(status.partial_transcript.is_none());
        assert!(status.error_message.is_none());
        assert!(status.levels.is_empty());
        assert!((status.recorded_secs - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn shared_status_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedStatus>();
    }

    #[test]
    fn shared_status_can_be_cloned_and_mutated() {
        let status = new_shared_status();
        let status2 = Arc::clone(&status);

        status.lock().unwrap().state = SessionState::Recording;
        assert_eq!(status2.lock().unwrap().state, SessionState::Recording);
    }
}
