//! Audio conversion utilities: channel downmix and resampling.
//!
//! The speech service accepts **mono** PCM at one of the supported sample
//! rates; capture hardware delivers whatever it likes. This module provides
//! the two conversion steps:
//!
//! 1. [`downmix_to_mono`] — average any number of interleaved channels.
//! 2. [`resample`] — convert between arbitrary sample rates.
//!
//! The resampler uses linear interpolation (fast, zero extra deps). For
//! better quality replace the inner loop with the `rubato` crate
//! (`SincFixedIn` + `BlackmanHarris2` window) — rubato is already listed in
//! `Cargo.toml` for that upgrade path.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all
/// channels.
///
/// The output length is `samples.len() / channels`.
///
/// * If `channels == 1` the input slice is returned as an owned `Vec` with
///   no averaging (fast path).
/// * If `channels == 0` an empty vector is returned.
///
/// # Example
///
/// ```rust
/// use speechos::audio::downmix_to_mono;
///
/// let stereo = vec![0.6_f32, 0.2, -0.4, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.4).abs() < 1e-6); // (0.6 + 0.2) / 2
/// assert!((mono[1] - 0.0).abs() < 1e-6); // (-0.4 + 0.4) / 2
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` Hz to `target_rate` Hz using
/// linear interpolation.
///
/// * If the rates match the input is cloned and returned unchanged.
/// * If `samples` is empty, or either rate is zero, an empty vector is
///   returned.
///
/// The output length is approximately
/// `samples.len() * target_rate / source_rate`.
///
/// # Example
///
/// ```rust
/// use speechos::audio::resample;
///
/// // Downsample 48 kHz → 16 kHz (ratio = 1/3)
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 16_000);
/// assert_eq!(lo.len(), 160);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == 0 || target_rate == 0 || samples.is_empty() {
        return Vec::new();
    }
    if source_rate == target_rate {
        return samples.to_vec();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            // Linear interpolation between adjacent samples
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- downmix_to_mono ---------------------------------------------------

    #[test]
    fn downmix_already_mono() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&input, 1), input);
    }

    #[test]
    fn downmix_stereo_averages_channels() {
        let input = vec![1.0_f32, -1.0, 0.5, 0.5];
        let out = downmix_to_mono(&input, 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_four_channels() {
        let input = vec![0.4_f32; 4];
        let out = downmix_to_mono(&input, 4);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_to_mono(&[1.0_f32, 2.0], 0).is_empty());
    }

    // ---- resample ----------------------------------------------------------

    #[test]
    fn same_rate_is_noop() {
        let input: Vec<f32> = (0..160).map(|i| i as f32 / 160.0).collect();
        let out = resample(&input, 16_000, 16_000);
        assert_eq!(out, input);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(resample(&[], 48_000, 16_000).is_empty());
    }

    #[test]
    fn zero_rates_return_empty() {
        assert!(resample(&[0.1_f32; 10], 0, 16_000).is_empty());
        assert!(resample(&[0.1_f32; 10], 48_000, 0).is_empty());
    }

    #[test]
    fn downsample_48k_to_16k_length() {
        // 480 samples @ 48 kHz = 10 ms → 160 samples @ 16 kHz
        let out = resample(&vec![0.5_f32; 480], 48_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn downsample_44100_to_16k_length() {
        let out = resample(&vec![0.0_f32; 44_100], 44_100, 16_000);
        // Allow ±1 sample rounding tolerance
        assert!(out.len().abs_diff(16_000) <= 1, "got {}", out.len());
    }

    #[test]
    fn upsample_8k_to_24k_length() {
        let out = resample(&vec![0.0_f32; 80], 8_000, 24_000);
        assert_eq!(out.len(), 240);
    }

    #[test]
    fn dc_signal_preserves_amplitude() {
        let out = resample(&vec![0.5_f32; 480], 48_000, 16_000);
        for &s in &out {
            assert!((s - 0.5).abs() < 1e-5, "amplitude drift: {s}");
        }
    }
}
