//! Configuration module for the speechos client.
//!
//! Provides `ClientConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for cross-platform data directories, the voice
//! catalog with persisted `VoiceSettings`, and TOML persistence via
//! `load` / `save` on each store.

pub mod paths;
pub mod settings;
pub mod voices;

pub use paths::AppPaths;
pub use settings::{
    ApiConfig, AudioSettings, ClientConfig, TransportConfig, SUPPORTED_SAMPLE_RATES,
};
pub use voices::{
    find_voice_by_id, voices_for_language, VoiceGender, VoiceInfo, VoiceSettings,
    DEFAULT_VOICE_ID, ENGLISH_VOICES, MULTILINGUAL_VOICES,
};
