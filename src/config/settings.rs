//! Client configuration structs, defaults, validation and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//!
//! [`ClientConfig::validate`] normalizes a loaded config: every out-of-range
//! or nonsensical value is replaced by its default (or clamped into range)
//! with a warning, so a hand-edited `settings.toml` can never take the
//! client down.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Sample rates the hosted speech service accepts.
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[8_000, 16_000, 24_000, 48_000];

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Settings for the control-plane REST API (token minting).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the control-plane API.
    pub base_url: String,
    /// API key — `None` for local/dev backends that skip authentication.
    pub api_key: Option<String>,
    /// Maximum seconds to wait for a control-plane response.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".into(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TransportConfig
// ---------------------------------------------------------------------------

/// Settings for the realtime transport that carries audio and transcripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// URL of the realtime server (e.g. `nats://localhost:4222`).
    pub server_url: String,
    /// Seconds to wait for the initial connection before giving up.
    pub connect_timeout_secs: u64,
    /// Maximum connection attempts before reporting a connect failure.
    pub reconnect_max_attempts: u32,
    /// Delay before the first reconnect attempt, in milliseconds.
    ///
    /// Subsequent attempts double the delay up to
    /// [`reconnect_max_delay_ms`](Self::reconnect_max_delay_ms).
    pub reconnect_initial_delay_ms: u64,
    /// Upper bound on the reconnect delay, in milliseconds.
    pub reconnect_max_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            server_url: "nats://localhost:4222".into(),
            connect_timeout_secs: 10,
            reconnect_max_attempts: 5,
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 8_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

/// Settings for microphone capture and session limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sample rate in Hz sent to the speech service.
    ///
    /// Must be one of [`SUPPORTED_SAMPLE_RATES`]; anything else falls back
    /// to 16 000 Hz on [`ClientConfig::validate`].
    pub sample_rate: u32,
    /// Audio input device name — `None` means the system default.
    pub input_device: Option<String>,
    /// Maximum recording length in seconds; the session stops automatically.
    pub max_session_secs: u32,
    /// Minimum utterance length in milliseconds before a transcript is
    /// requested; shorter recordings produce a session error.
    pub min_utterance_ms: u32,
    /// Number of level bars exposed to visualizer consumers.
    pub level_bars: usize,
}

/// Bounds applied by [`ClientConfig::validate`].
const MAX_SESSION_SECS_RANGE: std::ops::RangeInclusive<u32> = 1..=600;
const MIN_UTTERANCE_MS_FLOOR: u32 = 100;
const LEVEL_BARS_RANGE: std::ops::RangeInclusive<usize> = 1..=64;

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            input_device: None,
            max_session_secs: 120,
            min_utterance_ms: 500,
            level_bars: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level client configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speechos::config::ClientConfig;
///
/// // Load (returns Default when file is missing), then normalize.
/// let config = ClientConfig::load().unwrap().validate();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for
    /// server-side language detection.
    pub language: String,
    /// Control-plane API settings.
    pub api: ApiConfig,
    /// Realtime transport settings.
    pub transport: TransportConfig,
    /// Microphone capture and session-limit settings.
    pub audio: AudioSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language: Self::DEFAULT_LANGUAGE.into(),
            api: ApiConfig::default(),
            transport: TransportConfig::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(ClientConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Normalize the configuration, replacing invalid values with defaults.
    ///
    /// Each correction is logged with `log::warn!` naming the offending
    /// field. Calling `validate` on an already-valid config returns it
    /// unchanged, so the operation is idempotent.
    pub fn validate(mut self) -> Self {
        let defaults = Self::default();

        if self.language.trim().is_empty() {
            log::warn!(
                "config: empty language — falling back to {:?}",
                defaults.language
            );
            self.language = defaults.language.clone();
        }

        if self.api.base_url.trim().is_empty() {
            log::warn!(
                "config: empty api.base_url — falling back to {:?}",
                defaults.api.base_url
            );
            self.api.base_url = defaults.api.base_url.clone();
        }
        if self.api.timeout_secs == 0 {
            log::warn!(
                "config: api.timeout_secs = 0 — falling back to {}",
                defaults.api.timeout_secs
            );
            self.api.timeout_secs = defaults.api.timeout_secs;
        }

        if self.transport.server_url.trim().is_empty() {
            log::warn!(
                "config: empty transport.server_url — falling back to {:?}",
                defaults.transport.server_url
            );
            self.transport.server_url = defaults.transport.server_url.clone();
        }
        if self.transport.connect_timeout_secs == 0 {
            log::warn!(
                "config: transport.connect_timeout_secs = 0 — falling back to {}",
                defaults.transport.connect_timeout_secs
            );
            self.transport.connect_timeout_secs = defaults.transport.connect_timeout_secs;
        }
        if self.transport.reconnect_max_attempts == 0 {
            log::warn!(
                "config: transport.reconnect_max_attempts = 0 — falling back to {}",
                defaults.transport.reconnect_max_attempts
            );
            self.transport.reconnect_max_attempts = defaults.transport.reconnect_max_attempts;
        }
        if self.transport.reconnect_initial_delay_ms == 0 {
            log::warn!(
                "config: transport.reconnect_initial_delay_ms = 0 — falling back to {}",
                defaults.transport.reconnect_initial_delay_ms
            );
            self.transport.reconnect_initial_delay_ms =
                defaults.transport.reconnect_initial_delay_ms;
        }
        if self.transport.reconnect_max_delay_ms < self.transport.reconnect_initial_delay_ms {
            log::warn!(
                "config: transport.reconnect_max_delay_ms < initial delay — raising to {}",
                self.transport.reconnect_initial_delay_ms
            );
            self.transport.reconnect_max_delay_ms = self.transport.reconnect_initial_delay_ms;
        }

        if !SUPPORTED_SAMPLE_RATES.contains(&self.audio.sample_rate) {
            log::warn!(
                "config: unsupported audio.sample_rate {} — falling back to {}",
                self.audio.sample_rate,
                defaults.audio.sample_rate
            );
            self.audio.sample_rate = defaults.audio.sample_rate;
        }
        if !MAX_SESSION_SECS_RANGE.contains(&self.audio.max_session_secs) {
            let clamped = self
                .audio
                .max_session_secs
                .clamp(*MAX_SESSION_SECS_RANGE.start(), *MAX_SESSION_SECS_RANGE.end());
            log::warn!(
                "config: audio.max_session_secs {} out of range — clamping to {}",
                self.audio.max_session_secs,
                clamped
            );
            self.audio.max_session_secs = clamped;
        }
        if self.audio.min_utterance_ms < MIN_UTTERANCE_MS_FLOOR {
            log::warn!(
                "config: audio.min_utterance_ms {} below floor — clamping to {}",
                self.audio.min_utterance_ms,
                MIN_UTTERANCE_MS_FLOOR
            );
            self.audio.min_utterance_ms = MIN_UTTERANCE_MS_FLOOR;
        }
        if !LEVEL_BARS_RANGE.contains(&self.audio.level_bars) {
            let clamped = self
                .audio
                .level_bars
                .clamp(*LEVEL_BARS_RANGE.start(), *LEVEL_BARS_RANGE.end());
            log::warn!(
                "config: audio.level_bars {} out of range — clamping to {}",
                self.audio.level_bars,
                clamped
            );
            self.audio.level_bars = clamped;
        }

        self
    }
}

impl ClientConfig {
    /// Default language when none is configured.
    pub const DEFAULT_LANGUAGE: &'static str = "en";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `ClientConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = ClientConfig::default();
        original.save_to(&path).expect("save");

        let loaded = ClientConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = ClientConfig::load_from(&path).expect("should not error");
        assert_eq!(config, ClientConfig::default());
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = ClientConfig::default();
        cfg.language = "de".into();
        cfg.api.base_url = "https://api.example.com".into();
        cfg.api.api_key = Some("sk-test".into());
        cfg.transport.server_url = "nats://speech.example.com:4222".into();
        cfg.transport.reconnect_max_attempts = 9;
        cfg.audio.sample_rate = 48_000;
        cfg.audio.input_device = Some("USB Microphone".into());
        cfg.audio.max_session_secs = 30;

        cfg.save_to(&path).expect("save");
        let loaded = ClientConfig::load_from(&path).expect("load");
        assert_eq!(cfg, loaded);
    }

    // ---- validate: defaulting and clamping ---------------------------------

    #[test]
    fn validate_keeps_valid_config_unchanged() {
        let cfg = ClientConfig::default();
        let validated = cfg.clone().validate();
        assert_eq!(cfg, validated);
    }

    #[test]
    fn validate_is_idempotent() {
        let mut cfg = ClientConfig::default();
        cfg.audio.sample_rate = 11_025;
        cfg.audio.max_session_secs = 0;

        let once = cfg.validate();
        let twice = once.clone().validate();
        assert_eq!(once, twice);
    }

    #[test]
    fn validate_replaces_unsupported_sample_rate() {
        let mut cfg = ClientConfig::default();
        cfg.audio.sample_rate = 44_100;
        let v = cfg.validate();
        assert_eq!(v.audio.sample_rate, 16_000);
    }

    #[test]
    fn validate_clamps_max_session_secs() {
        let mut cfg = ClientConfig::default();
        cfg.audio.max_session_secs = 0;
        assert_eq!(cfg.clone().validate().audio.max_session_secs, 1);

        cfg.audio.max_session_secs = 10_000;
        assert_eq!(cfg.validate().audio.max_session_secs, 600);
    }

    #[test]
    fn validate_raises_min_utterance_to_floor() {
        let mut cfg = ClientConfig::default();
        cfg.audio.min_utterance_ms = 5;
        assert_eq!(cfg.validate().audio.min_utterance_ms, 100);
    }

    #[test]
    fn validate_clamps_level_bars() {
        let mut cfg = ClientConfig::default();
        cfg.audio.level_bars = 0;
        assert_eq!(cfg.clone().validate().audio.level_bars, 1);

        cfg.audio.level_bars = 500;
        assert_eq!(cfg.validate().audio.level_bars, 64);
    }

    #[test]
    fn validate_restores_empty_urls() {
        let mut cfg = ClientConfig::default();
        cfg.api.base_url = "   ".into();
        cfg.transport.server_url = String::new();

        let v = cfg.validate();
        assert_eq!(v.api.base_url, ApiConfig::default().base_url);
        assert_eq!(v.transport.server_url, TransportConfig::default().server_url);
    }

    #[test]
    fn validate_restores_zero_reconnect_fields() {
        let mut cfg = ClientConfig::default();
        cfg.transport.reconnect_max_attempts = 0;
        cfg.transport.reconnect_initial_delay_ms = 0;

        let v = cfg.validate();
        let d = TransportConfig::default();
        assert_eq!(v.transport.reconnect_max_attempts, d.reconnect_max_attempts);
        assert_eq!(
            v.transport.reconnect_initial_delay_ms,
            d.reconnect_initial_delay_ms
        );
    }

    #[test]
    fn validate_raises_max_delay_to_initial_delay() {
        let mut cfg = ClientConfig::default();
        cfg.transport.reconnect_initial_delay_ms = 2_000;
        cfg.transport.reconnect_max_delay_ms = 100;

        let v = cfg.validate();
        assert_eq!(v.transport.reconnect_max_delay_ms, 2_000);
    }

    #[test]
    fn validate_fills_empty_language() {
        let cfg = ClientConfig {
            language: String::new(),
            ..ClientConfig::default()
        };
        let v = cfg.validate();
        assert_eq!(v.language, ClientConfig::DEFAULT_LANGUAGE);
    }
}
