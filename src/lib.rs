//! speechos — voice-dictation client SDK.
//!
//! Embeds voice dictation into an application: captures microphone audio,
//! streams it to a hosted speech service, tracks the recording lifecycle
//! through a small state machine, and fans session events out to any number
//! of consumers.
//!
//! # Layers
//!
//! - [`config`] — client configuration, voice catalog and persisted settings.
//! - [`audio`] — cpal microphone capture, conversion, buffering and level
//!   metering.
//! - [`backend`] — the [`backend::VoiceBackend`] transport abstraction and
//!   its NATS implementation.
//! - [`session`] — the [`session::DictationSession`] orchestrator and state
//!   machine.
//! - [`events`] — the broadcast [`events::EventBus`] consumers subscribe to.
//! - [`commands`] — voice-command definitions and transcript matching.

pub mod audio;
pub mod backend;
pub mod commands;
pub mod config;
pub mod events;
pub mod session;

pub use backend::{BackendError, NatsBackend, SessionTokenProvider, VoiceBackend};
pub use commands::{CommandRegistry, CommandSpec};
pub use config::{ClientConfig, VoiceSettings};
pub use events::{EventBus, SessionEvent};
pub use session::{DictationSession, SessionCommand, SessionState, SessionStatus};
