//! Audio fixture generation.
//!
//! Two flavors: hand-assembled WAV byte images for in-memory sources
//! with exactly known content, and `hound`-written files for the
//! on-disk open path. Fixtures default to 8 kHz so device buffers stay
//! small and real-time consumption finishes quickly.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Low rate keeps null-device playback times short.
pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Deterministic interleaved content: sample `i` holds `i` modulo the
/// positive i16 range, so any read position is self-describing.
pub fn ramp_samples(count: usize) -> Vec<i16> {
    (0..count).map(|i| (i % 32768) as i16).collect()
}

/// Assemble a complete 16-bit PCM WAV byte image from interleaved
/// samples.
pub fn wav_image(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

/// Write a sine-wave WAV file and return its path.
///
/// All channels carry the same signal. Amplitude is fixed at half scale
/// to stay clear of clipping.
pub fn sine_wav_file(
    dir: &Path,
    name: &str,
    channels: u16,
    sample_rate: u32,
    duration_ms: u64,
    frequency_hz: f32,
) -> PathBuf {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let path = dir.join(name);
    let mut writer = WavWriter::create(&path, spec).expect("create wav fixture");

    let total_frames = sample_rate as u64 * duration_ms / 1000;
    for frame in 0..total_frames {
        let t = frame as f32 / sample_rate as f32;
        let sample = ((2.0 * PI * frequency_hz * t).sin() * 0.5 * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).expect("write wav fixture");
        }
    }
    writer.finalize().expect("finalize wav fixture");
    path
}
