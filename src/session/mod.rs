//! Session module — the dictation lifecycle core.
//!
//! This module wires microphone capture, the backend transport and the
//! event bus together, and exposes the shared status snapshot widget layers
//! read on demand.
//!
//! # Architecture
//!
//! ```text
//! SessionCommand (mpsc)
//!        │
//!        ▼
//! DictationSession::run()  ← async tokio task
//!        │
//!        ├─ Start  → VoiceBackend::start_voice_session → Recording
//!        │             ├─ audio pump: CaptureBuffer → send_audio
//!        │             └─ transcript task: events out
//!        ├─ Stop   → flush → Processing → final transcript → Idle
//!        └─ Cancel → discard → Idle
//!
//! SessionStatus (Arc<Mutex<…>>) ←─── polled by widget layers
//! EventBus (broadcast)          ←─── subscribed by widget layers
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use speechos::commands::CommandRegistry;
//! use speechos::config::{ClientConfig, VoiceSettings};
//! use speechos::events::EventBus;
//! use speechos::session::{DictationSession, SessionCommand};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::default();
//!     let events = EventBus::default();
//!
//!     // (backend constructed from config)
//!     # use speechos::backend::VoiceBackend;
//!     # fn make_backend() -> Arc<dyn VoiceBackend> { unimplemented!() }
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel(16);
//!     let session = DictationSession::new(
//!         config,
//!         VoiceSettings::default(),
//!         CommandRegistry::in_memory(Vec::new()),
//!         make_backend(),
//!         events.clone(),
//!         &tx,
//!     );
//!
//!     tokio::spawn(async move { session.run(rx).await });
//!
//!     tx.send(SessionCommand::Start).await.unwrap();
//! }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{DictationSession, SessionCommand, SharedCaptureBuffer};
pub use state::{new_shared_status, SessionState, SessionStatus, SharedStatus};
