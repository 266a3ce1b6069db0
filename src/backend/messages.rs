//! Wire messages exchanged with the speech service, as serde JSON.
//!
//! Audio travels as base64-encoded 16-bit little-endian PCM inside
//! [`AudioFrameMessage`]; everything else is small request/response records.
//! Subjects are derived from the session id via the `subjects` helpers.

use base64::Engine;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// Subject helpers for the per-session and service-wide channels.
pub mod subjects {
    /// Audio frames published by the client for one session.
    pub fn audio(session_id: &str) -> String {
        format!("speech.audio.{session_id}")
    }

    /// Transcript updates published by the service for one session.
    pub fn transcript(session_id: &str) -> String {
        format!("speech.transcript.{session_id}")
    }

    /// Session open request-reply.
    pub const SESSION_START: &str = "speech.session.start";
    /// Session close request-reply.
    pub const SESSION_STOP: &str = "speech.session.stop";
    /// Text-edit request-reply.
    pub const EDIT: &str = "speech.edit";
    /// Command-resolution request-reply.
    pub const COMMAND: &str = "speech.command";
    /// Speech-synthesis request-reply.
    pub const SPEAK: &str = "speech.tts";
}

// ---------------------------------------------------------------------------
// PCM encoding
// ---------------------------------------------------------------------------

/// Encode `f32` samples in `[-1.0, 1.0]` as base64 16-bit LE PCM.
pub fn encode_pcm(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|s| {
            let clamped = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            clamped.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode base64 16-bit LE PCM back into `f32` samples.
///
/// Returns `None` when the payload is not valid base64 or has an odd byte
/// count.
pub fn decode_pcm(encoded: &str) -> Option<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .ok()?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Session control
// ---------------------------------------------------------------------------

/// Opens a voice session on the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartRequest {
    pub session_id: String,
    pub language: String,
    pub sample_rate: u32,
}

/// Reply to [`SessionStartRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub accepted: bool,
    /// Populated when `accepted == false`.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Closes a voice session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStopRequest {
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// Audio / transcripts
// ---------------------------------------------------------------------------

/// One chunk of captured audio published to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    /// Base64-encoded 16-bit LE PCM; empty in the final frame.
    pub pcm: String,
    pub sample_rate: u32,
    /// RFC3339 capture timestamp.
    pub timestamp: String,
    /// Marks the last frame of the utterance.
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Transcript update received from the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    /// `true` for interim results that may still be revised.
    pub partial: bool,
    pub timestamp: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

// ---------------------------------------------------------------------------
// Edit / command / synthesis
// ---------------------------------------------------------------------------

/// Asks the service to rewrite `text` according to `instruction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    pub text: String,
    pub instruction: String,
    pub language: String,
}

/// Reply to [`EditRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Asks the service to resolve a command intent from a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub transcript: String,
    pub language: String,
}

/// Reply to [`CommandRequest`]. `command_id == None` means no intent found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub args: String,
}

/// Asks the service to synthesize speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    pub voice_id: String,
    pub speaking_rate: f32,
}

/// Reply to [`SpeakRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakResponse {
    /// Base64-encoded 16-bit LE PCM.
    #[serde(default)]
    pub audio: Option<String>,
    pub sample_rate: u32,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
