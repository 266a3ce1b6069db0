//! Input-level data for microphone visualizer consumers.
//!
//! The session core recomputes [`InputLevels`] from the newest captured
//! audio and publishes it as a [`crate::events::SessionEvent::InputLevel`]
//! event; widget layers render it as a bar meter.
//!
//! # Example
//!
//! ```rust
//! use speechos::audio::InputLevels;
//!
//! // Simulate 1 second of audio at 16 kHz
//! let audio: Vec<f32> = (0..16_000)
//!     .map(|i| (i as f32 * 0.001).sin() * 0.5)
//!     .collect();
//!
//! let levels = InputLevels::compute(&audio, 20);
//! assert_eq!(levels.bars.len(), 20);
//! assert!(levels.bars.iter().all(|&b| (0.0..=1.0).contains(&b)));
//! ```

// ---------------------------------------------------------------------------
// InputLevels
// ---------------------------------------------------------------------------

/// Amplitude snapshot for a bar-meter visualization.
///
/// Each element of `bars` is an RMS amplitude value in `[0.0, 1.0]`
/// representing an equal-width chunk of the input audio.
#[derive(Debug, Clone)]
pub struct InputLevels {
    /// RMS amplitude per bar, clamped to `[0.0, 1.0]`.
    pub bars: Vec<f32>,
}

impl InputLevels {
    /// Compute `num_bars` RMS amplitude values from `audio`.
    ///
    /// The audio is divided into `num_bars` equal-sized chunks; the RMS of
    /// each chunk becomes one bar value. If `audio` is shorter than
    /// `num_bars` the remaining bars are padded with `0.0`.
    ///
    /// # Arguments
    ///
    /// * `audio` — mono `f32` samples, newest window of the recording.
    /// * `num_bars` — number of bars to produce (the configured
    ///   `level_bars`). If `0`, an empty `InputLevels` is returned.
    pub fn compute(audio: &[f32], num_bars: usize) -> Self {
        if num_bars == 0 {
            return Self { bars: Vec::new() };
        }

        if audio.is_empty() {
            return Self {
                bars: vec![0.0; num_bars],
            };
        }

        let chunk_size = (audio.len() / num_bars).max(1);

        let mut bars: Vec<f32> = audio
            .chunks(chunk_size)
            .take(num_bars)
            .map(|chunk| {
                let mean_sq: f32 =
                    chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32;
                mean_sq.sqrt().min(1.0) // clamp to [0.0, 1.0]
            })
            .collect();

        // Pad any remaining bars with 0.0
        bars.resize(num_bars, 0.0);

        Self { bars }
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Returns `true` when there are no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Peak bar value across the snapshot (useful for normalisation).
    pub fn peak(&self) -> f32 {
        self.bars.iter().cloned().fold(0.0_f32, f32::max)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
