//! Uniform access to one decodable audio source.
//!
//! A `SoundFile` pairs one stream with the decoder the registry picked
//! for it, exposing metadata and sequential/seekable interleaved `i16`
//! reads. The stream moves into the decode session and is released when
//! the `SoundFile` drops.

use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use symphonia::core::io::MediaSource;
use tracing::debug;

use crate::decoder::{registry, Decoder, SoundInfo};
use crate::error::{Error, Result};

pub struct SoundFile {
    decoder: Box<dyn Decoder>,
    info: SoundInfo,
}

impl fmt::Debug for SoundFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoundFile")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl SoundFile {
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Open(format!("cannot open {}: {e}", path.display())))?;
        debug!("opening audio source {}", path.display());
        Self::open_stream(Box::new(file))
    }

    pub fn open_memory(data: Vec<u8>) -> Result<Self> {
        Self::open_stream(Box::new(Cursor::new(data)))
    }

    pub fn open_stream(stream: Box<dyn MediaSource>) -> Result<Self> {
        let decoder = registry::create_reader(stream)?;
        let info = decoder.info();
        Ok(SoundFile { decoder, info })
    }

    /// Total interleaved samples; zero when the container does not
    /// declare a total.
    pub fn sample_count(&self) -> u64 {
        self.info.sample_count
    }

    pub fn channel_count(&self) -> u16 {
        self.info.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.info.channel_count == 0 || self.info.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.info.sample_count / self.info.channel_count as u64;
        Duration::from_secs_f64(frames as f64 / self.info.sample_rate as f64)
    }

    /// Positions the cursor at an absolute interleaved sample offset.
    pub fn seek_sample(&mut self, sample_offset: u64) -> Result<()> {
        self.decoder.seek(sample_offset)
    }

    /// Positions the cursor at a time offset, aligned to a frame
    /// boundary.
    pub fn seek(&mut self, offset: Duration) -> Result<()> {
        let frame = (offset.as_secs_f64() * self.info.sample_rate as f64) as u64;
        self.decoder.seek(frame * self.info.channel_count as u64)
    }

    /// Fills `out` with interleaved samples and returns the count
    /// written; a short count means the source ended.
    pub fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        self.decoder.read(out)
    }
}
