//! Session event types and the fan-out bus UI consumers subscribe to.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel: every subscriber
//! gets its own copy of every event emitted after it subscribed. Emitting is
//! non-blocking and never fails — with no subscribers the event is simply
//! dropped, so the session core never stalls on a missing consumer.
//!
//! # Example
//!
//! ```rust
//! use speechos::events::{EventBus, SessionEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(SessionEvent::PartialTranscript { text: "hel".into() });
//!
//! match rx.recv().await.unwrap() {
//!     SessionEvent::PartialTranscript { text } => assert_eq!(text, "hel"),
//!     other => panic!("unexpected event: {other:?}"),
//! }
//! # }
//! ```

use tokio::sync::broadcast;

use crate::session::SessionState;

// ---------------------------------------------------------------------------
// SessionEvent
// ---------------------------------------------------------------------------

/// Everything the session core reports to its consumers.
///
/// Variants are cheap to clone; synthesized audio is the only payload that
/// can be large, and it is produced at most once per `Speak` request.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session state machine moved to a new state.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },

    /// The transport is connected and the backend accepted the session.
    Connected,

    /// The transport dropped. `reason` is `None` for a clean disconnect.
    Disconnected { reason: Option<String> },

    /// A reconnect attempt is about to start (1-based).
    Reconnecting { attempt: u32 },

    /// Interim transcript for the in-flight utterance; may be revised.
    PartialTranscript { text: String },

    /// Final transcript for the utterance; never revised afterwards.
    FinalTranscript { text: String },

    /// Result of a `request_edit_text` round trip.
    EditCompleted { text: String },

    /// A voice command matched the transcript.
    CommandMatched {
        command_id: String,
        /// Trailing transcript text after the matched phrase.
        args: String,
    },

    /// Synthesized speech returned by the backend.
    SpeechSynthesized {
        /// Raw 16-bit little-endian PCM.
        audio: Vec<u8>,
        sample_rate: u32,
        voice_id: String,
    },

    /// Fresh input-level bars for visualizer consumers, each in `[0.0, 1.0]`.
    InputLevel { bars: Vec<f32> },

    /// A recoverable session error. Recording-lifecycle failures also move
    /// the state machine to `Error` (the next start recovers); request
    /// failures such as synthesis leave the state unchanged.
    SessionError { message: String },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Multi-consumer fan-out for [`SessionEvent`]s.
///
/// Cheap to clone; all clones share the same channel. Late subscribers only
/// see events emitted after [`subscribe`](Self::subscribe) — consumers that
/// need current state without history should read the session status
/// snapshot instead.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus whose per-subscriber backlog holds `capacity` events.
    ///
    /// A subscriber that falls more than `capacity` events behind observes
    /// `RecvError::Lagged` and skips to the oldest retained event (tokio
    /// broadcast semantics).
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0` (propagated from `broadcast::channel`).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new independent subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit `event` to all current subscribers.
    ///
    /// Never blocks and never fails; with zero subscribers the event is
    /// dropped silently.
    pub fn emit(&self, event: SessionEvent) {
        // send() errs only when there are no receivers — not an error here.
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        bus.emit(SessionEvent::Connected);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(SessionEvent::FinalTranscript {
            text: "hello world".into(),
        });

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                SessionEvent::FinalTranscript { text } => assert_eq!(text, "hello world"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new(8);
        let mut early = bus.subscribe();

        bus.emit(SessionEvent::Connected);

        let mut late = bus.subscribe();
        bus.emit(SessionEvent::Disconnected { reason: None });

        // Early subscriber sees both events in order.
        assert!(matches!(
            early.recv().await.unwrap(),
            SessionEvent::Connected
        ));
        assert!(matches!(
            early.recv().await.unwrap(),
            SessionEvent::Disconnected { .. }
        ));

        // Late subscriber only sees the disconnect.
        assert!(matches!(
            late.recv().await.unwrap(),
            SessionEvent::Disconnected { .. }
        ));
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn clones_share_the_same_channel() {
        let bus = EventBus::new(8);
        let clone = bus.clone();
        let mut rx = bus.subscribe();

        clone.emit(SessionEvent::Reconnecting { attempt: 1 });

        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::Reconnecting { attempt: 1 }
        ));
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let bus = EventBus::new(4);
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn event_bus_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EventBus>();
    }
}
