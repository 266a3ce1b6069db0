//! Bounded capture buffer for in-flight utterance audio.
//!
//! [`CaptureBuffer`] accumulates mono `f32` samples between session start
//! and stop. When the buffer is full, new samples **evict** the oldest data
//! so the most-recent `capacity` samples are always available — if the user
//! talks past the session limit, the tail of the utterance wins.
//!
//! # Example
//!
//! ```rust
//! use speechos::audio::CaptureBuffer;
//!
//! let mut buf = CaptureBuffer::new(4);
//! buf.push(&[1.0, 2.0, 3.0, 4.0, 5.0]); // 5 items → capacity 4 → oldest evicted
//! assert_eq!(buf.take_all(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// CaptureBuffer
// ---------------------------------------------------------------------------

/// Fixed-capacity sample accumulator with evict-oldest overflow.
///
/// Backed by a `VecDeque` pre-allocated to `capacity`; the buffer never
/// grows beyond it.
pub struct CaptureBuffer {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl CaptureBuffer {
    /// Create a new buffer holding at most `capacity` samples.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "CaptureBuffer capacity must be > 0");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `data`, evicting the oldest samples on overflow.
    pub fn push(&mut self, data: &[f32]) {
        for &sample in data {
            if self.samples.len() == self.capacity {
                self.samples.pop_front();
            }
            self.samples.push_back(sample);
        }
    }

    /// Remove and return all stored samples in chronological order.
    ///
    /// After this call `len() == 0`.
    pub fn take_all(&mut self) -> Vec<f32> {
        self.samples.drain(..).collect()
    }

    /// Discard all stored samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Copy of the newest `n` samples (fewer when less is stored), oldest
    /// first. Used for level metering without disturbing the buffer.
    pub fn tail(&self, n: usize) -> Vec<f32> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// Number of samples currently stored.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the buffer contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current buffered duration in seconds, assuming `sample_rate` Hz mono.
    pub fn seconds(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
