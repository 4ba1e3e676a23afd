//! Pluggable audio decoders.
//!
//! A decoder turns a seekable byte stream into interleaved 16-bit PCM.
//! Formats register a [`DecoderFactory`] with the registry; opening a
//! source probes the registered factories in order and builds a decode
//! session from the first one that recognizes the stream.

pub mod registry;
pub mod vorbis;
pub mod wav;

use std::fmt;

use symphonia::core::io::MediaSource;

use crate::error::Result;

/// Metadata for one decodable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundInfo {
    /// Total interleaved samples (frames × channels). Zero when the
    /// container does not declare a total.
    pub sample_count: u64,
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// A stateful decode session over one owned stream.
pub trait Decoder: Send {
    fn info(&self) -> SoundInfo;

    /// Positions the read cursor at an absolute interleaved sample
    /// offset. When the total is known, offsets past the end clamp to
    /// the end; otherwise a past-end seek may fail.
    fn seek(&mut self, sample_offset: u64) -> Result<()>;

    /// Fills `out` with interleaved samples and returns the count
    /// written. Zero means end of stream.
    fn read(&mut self, out: &mut [i16]) -> Result<usize>;
}

impl fmt::Debug for dyn Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("info", &self.info())
            .finish_non_exhaustive()
    }
}

/// Recognizes one format and opens decode sessions for it.
pub trait DecoderFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probes a stream positioned at offset 0. Probes may consume input;
    /// the registry rewinds the stream between attempts.
    fn check(&self, stream: &mut dyn MediaSource) -> bool;

    /// Opens a decode session over a stream positioned at offset 0.
    fn open(&self, stream: Box<dyn MediaSource>) -> Result<Box<dyn Decoder>>;
}
