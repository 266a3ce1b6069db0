//! Speech-service backend module.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 VoiceBackend (trait)                    │
//! │                                                        │
//! │  ┌──────────────────────┐    ┌──────────────────────┐  │
//! │  │ SessionTokenProvider │    │     NatsBackend      │  │
//! │  │ - mint_token (HTTP)  │───▶│ - connect w/ backoff │  │
//! │  └──────────────────────┘    │ - audio frames out   │  │
//! │                              │ - transcripts in     │  │
//! │                              │ - edit/command/tts   │  │
//! │                              └──────────────────────┘  │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use speechos::backend::{NatsBackend, SessionTokenProvider, VoiceBackend};
//! use speechos::config::{ClientConfig, VoiceSettings};
//! use speechos::events::EventBus;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::load()?.validate();
//!     let voice = VoiceSettings::load()?;
//!     let events = EventBus::default();
//!
//!     let token = SessionTokenProvider::from_config(&config.api)
//!         .mint_token()
//!         .await
//!         .ok(); // local/dev servers accept unauthenticated connections
//!
//!     let backend = NatsBackend::connect(&config, &voice, token, events).await?;
//!     assert!(backend.is_connected());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod messages;
pub mod remote;
pub mod service;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use auth::SessionTokenProvider;
pub use messages::{
    AudioFrameMessage, CommandRequest, CommandResponse, EditRequest, EditResponse,
    SessionStartRequest, SessionStartResponse, SessionStopRequest, SpeakRequest, SpeakResponse,
    TranscriptMessage,
};
pub use remote::NatsBackend;
pub use service::{
    BackendError, CommandOutcome, SynthesizedSpeech, TranscriptUpdate, VoiceBackend,
    VoiceSessionHandle, VoiceSessionOptions,
};

// test-only re-export so the session test module can import MockBackend
// without `use speechos::backend::service::MockBackend`.
#[cfg(test)]
pub use service::MockBackend;
