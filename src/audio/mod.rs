//! Audio pipeline — microphone capture → conversion → capture buffer →
//! level metering.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → downmix_to_mono
//!           → resample → CaptureBuffer → InputLevels
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//! use speechos::audio::{AudioChunk, MicCapture};
//!
//! let (tx, rx) = mpsc::channel::<AudioChunk>();
//! let capture = MicCapture::new(None).unwrap();
//! let _handle = capture.start(tx).unwrap(); // drop handle → stops stream
//!
//! while let Ok(chunk) = rx.recv() {
//!     println!("received {} samples @ {}Hz", chunk.samples.len(), chunk.sample_rate);
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod convert;
pub mod levels;

pub use buffer::CaptureBuffer;
pub use capture::{AudioChunk, CaptureError, MicCapture, StreamHandle};
pub use convert::{downmix_to_mono, resample};
pub use levels::InputLevels;
