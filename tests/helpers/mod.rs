//! Test helper modules for soundfield integration tests
//!
//! Provides reusable test infrastructure components:
//! - backend: null-device audio contexts with inspection handles
//! - fixtures: deterministic WAV generation, in memory and on disk
#![allow(dead_code)]

pub mod backend;
pub mod fixtures;

// Re-export commonly used helpers
pub use backend::null_context;
pub use fixtures::{ramp_samples, sine_wav_file, wav_image, TEST_SAMPLE_RATE};
