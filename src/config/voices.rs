//! Voice catalog and persisted voice settings.
//!
//! Two const arrays list the synthesis voices offered by the hosted speech
//! service:
//! - [`ENGLISH_VOICES`] — English-optimised voices.
//! - [`MULTILINGUAL_VOICES`] — voices usable with any supported language.
//!
//! [`VoiceSettings`] persists the user's voice selection as `voice.toml`.
//! A stored id that names no catalog entry is kept on disk (the catalog may
//! grow back) but [`VoiceSettings::resolve_voice`] falls back to
//! [`DEFAULT_VOICE_ID`] so playback never fails on a stale selection.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Voice id used whenever no valid selection is stored.
pub const DEFAULT_VOICE_ID: &str = "aria";

// ---------------------------------------------------------------------------
// VoiceGender
// ---------------------------------------------------------------------------

/// Presentation tag for a synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceGender {
    Feminine,
    Masculine,
    Neutral,
}

// ---------------------------------------------------------------------------
// VoiceInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single synthesis voice.
#[derive(Debug)]
pub struct VoiceInfo {
    /// Unique identifier stored in `VoiceSettings::voice_id` (e.g. `"aria"`).
    pub id: &'static str,
    /// Human-readable display name shown in selection UIs.
    pub display_name: &'static str,
    /// ISO-639-1 language code, or `"multilingual"`.
    pub language: &'static str,
    /// Presentation tag.
    pub gender: VoiceGender,
    /// Native sample rate of the synthesis output in Hz.
    pub sample_rate: u32,
}

// ---------------------------------------------------------------------------
// Voice catalogs
// ---------------------------------------------------------------------------

/// English-optimised voices.
pub const ENGLISH_VOICES: &[VoiceInfo] = &[
    VoiceInfo {
        id: "aria",
        display_name: "Aria (US English)",
        language: "en",
        gender: VoiceGender::Feminine,
        sample_rate: 24_000,
    },
    VoiceInfo {
        id: "marcus",
        display_name: "Marcus (US English)",
        language: "en",
        gender: VoiceGender::Masculine,
        sample_rate: 24_000,
    },
    VoiceInfo {
        id: "sage",
        display_name: "Sage (British English)",
        language: "en",
        gender: VoiceGender::Neutral,
        sample_rate: 24_000,
    },
];

/// Voices usable with any supported language.
pub const MULTILINGUAL_VOICES: &[VoiceInfo] = &[
    VoiceInfo {
        id: "nova",
        display_name: "Nova (Multilingual)",
        language: "multilingual",
        gender: VoiceGender::Feminine,
        sample_rate: 24_000,
    },
    VoiceInfo {
        id: "atlas",
        display_name: "Atlas (Multilingual)",
        language: "multilingual",
        gender: VoiceGender::Masculine,
        sample_rate: 24_000,
    },
];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Return the recommended voice list for the given ISO-639-1 language code.
///
/// `"en"` → [`ENGLISH_VOICES`]; everything else → [`MULTILINGUAL_VOICES`].
pub fn voices_for_language(language: &str) -> &'static [VoiceInfo] {
    if language == "en" {
        ENGLISH_VOICES
    } else {
        MULTILINGUAL_VOICES
    }
}

/// Find a [`VoiceInfo`] by its `id` string, searching both catalogs.
pub fn find_voice_by_id(id: &str) -> Option<&'static VoiceInfo> {
    ENGLISH_VOICES
        .iter()
        .chain(MULTILINGUAL_VOICES.iter())
        .find(|v| v.id == id)
}

// ---------------------------------------------------------------------------
// VoiceSettings
// ---------------------------------------------------------------------------

/// Persisted voice preferences, serialised as `voice.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Selected voice id. May name a voice no longer in the catalog; see
    /// [`resolve_voice`](Self::resolve_voice).
    pub voice_id: String,
    /// Playback speed multiplier, clamped to `0.5..=2.0` on load.
    pub speaking_rate: f32,
    /// Output volume, clamped to `0.0..=1.0` on load.
    pub volume: f32,
    /// Play synthesized speech as soon as it arrives.
    pub autoplay: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.into(),
            speaking_rate: 1.0,
            volume: 1.0,
            autoplay: true,
        }
    }
}

impl VoiceSettings {
    /// Load voice settings from the platform-appropriate `voice.toml`.
    ///
    /// Missing file ⇒ `Ok(default)`. Out-of-range numeric fields are
    /// clamped with a warning; an unknown `voice_id` is preserved (it only
    /// affects resolution, not storage).
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().voice_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings.clamped())
    }

    /// Save to the platform-appropriate `voice.toml`.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().voice_file)
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

    /// Resolve the stored selection against the catalog.
    ///
    /// Returns the catalog entry for `voice_id`, or the [`DEFAULT_VOICE_ID`]
    /// entry (with a warning) when the stored id is unknown. Never fails:
    /// the default voice is guaranteed to exist in the catalog.
    pub fn resolve_voice(&self) -> &'static VoiceInfo {
        match find_voice_by_id(&self.voice_id) {
            Some(voice) => voice,
            None => {
                log::warn!(
                    "voice settings: unknown voice id {:?} — falling back to {:?}",
                    self.voice_id,
                    DEFAULT_VOICE_ID
                );
                find_voice_by_id(DEFAULT_VOICE_ID)
                    .unwrap_or(&ENGLISH_VOICES[0])
            }
        }
    }

    fn clamped(mut self) -> Self {
        if !(0.5..=2.0).contains(&self.speaking_rate) {
            let clamped = self.speaking_rate.clamp(0.5, 2.0);
            log::warn!(
                "voice settings: speaking_rate {} out of range — clamping to {clamped}",
                self.speaking_rate
            );
            self.speaking_rate = clamped;
        }
        if !(0.0..=1.0).contains(&self.volume) {
            let clamped = self.volume.clamp(0.0, 1.0);
            log::warn!(
                "voice settings: volume {} out of range — clamping to {clamped}",
                self.volume
            );
            self.volume = clamped;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
