//! Ogg/Vorbis decoder over symphonia.
//!
//! The probe of `check` is a direct header validation (Ogg capture
//! pattern, beginning-of-stream flag, Vorbis identification packet)
//! rather than a trial open: the session library takes ownership of its
//! source, and a probe must leave the stream reusable.

use std::collections::VecDeque;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_VORBIS};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use crate::error::{Error, Result};

use super::{Decoder, DecoderFactory, SoundInfo};

/// Coarse-seek slack, one maximum Vorbis block: the first packet
/// decoded after a reset only re-primes the overlap window and emits
/// nothing, so the landing point must sit at least one packet before
/// the target.
const SEEK_BACKOFF_FRAMES: u64 = 8192;

pub struct VorbisFactory;

impl DecoderFactory for VorbisFactory {
    fn name(&self) -> &'static str {
        "vorbis"
    }

    fn check(&self, stream: &mut dyn MediaSource) -> bool {
        use std::io::Read;
        // First Ogg page: capture pattern, version 0, beginning-of-stream
        // flag, then the segment table and the first packet's
        // identification header.
        let mut page = [0u8; 27];
        if stream.read_exact(&mut page).is_err() {
            return false;
        }
        if &page[0..4] != b"OggS" || page[4] != 0 || page[5] & 0x02 == 0 {
            return false;
        }
        let segments = page[26] as usize;
        if segments == 0 {
            return false;
        }
        let mut lacing = vec![0u8; segments];
        if stream.read_exact(&mut lacing).is_err() {
            return false;
        }
        let mut ident = [0u8; 7];
        if stream.read_exact(&mut ident).is_err() {
            return false;
        }
        ident == *b"\x01vorbis"
    }

    fn open(&self, stream: Box<dyn MediaSource>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(VorbisDecoder::open(stream)?))
    }
}

pub struct VorbisDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    info: SoundInfo,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Decoded samples not yet handed to the caller.
    carry: VecDeque<i16>,
    /// Interleaved index of the next sample `read` will return.
    position: u64,
    ended: bool,
}

impl VorbisDecoder {
    pub fn open(stream: Box<dyn MediaSource>) -> Result<Self> {
        let mss = MediaSourceStream::new(stream, Default::default());
        let mut hint = Hint::new();
        hint.with_extension("ogg");
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Open(format!("not a decodable ogg stream: {e}")))?;
        let format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| Error::Format("ogg stream has no default track".into()))?;
        let params = track.codec_params.clone();
        let track_id = track.id;
        if params.codec != CODEC_TYPE_VORBIS {
            return Err(Error::Format("ogg stream is not vorbis".into()));
        }
        let channel_count = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Format("vorbis stream lacks channel layout".into()))?;
        if channel_count == 0 {
            return Err(Error::Format("vorbis stream has zero channels".into()));
        }
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Format("vorbis stream lacks a sample rate".into()))?;
        let sample_count = match params.n_frames {
            Some(frames) => frames * channel_count as u64,
            None => {
                debug!("ogg container does not declare a total length");
                0
            }
        };
        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("vorbis decoder init failed: {e}")))?;
        Ok(VorbisDecoder {
            format,
            decoder,
            track_id,
            info: SoundInfo {
                sample_count,
                channel_count,
                sample_rate,
            },
            sample_buf: None,
            carry: VecDeque::new(),
            position: 0,
            ended: false,
        })
    }

    /// Decodes the next packet into the carry-over queue. Returns false
    /// at end of stream.
    fn pull_packet(&mut self) -> bool {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.ended = true;
                    return false;
                }
                Err(e) => {
                    debug!("ogg read ended the stream: {e}");
                    self.ended = true;
                    return false;
                }
            };
            if packet.track_id() != self.track_id {
                continue;
            }
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    // The carry is empty at every call site, so the packet
                    // timestamp pins the absolute position of the next
                    // sample handed out.
                    self.position = packet.ts() * self.info.channel_count as u64;
                    let buf = self.sample_buf.get_or_insert_with(|| {
                        SampleBuffer::<i16>::new(decoded.capacity() as u64, *decoded.spec())
                    });
                    buf.copy_interleaved_ref(decoded);
                    self.carry.extend(buf.samples());
                    return true;
                }
                // Recoverable per the codec contract: skip the packet.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!("vorbis packet skipped: {e}");
                    continue;
                }
                Err(e) => {
                    debug!("vorbis decode ended the stream: {e}");
                    self.ended = true;
                    return false;
                }
            }
        }
    }
}

impl Decoder for VorbisDecoder {
    fn info(&self) -> SoundInfo {
        self.info
    }

    fn seek(&mut self, sample_offset: u64) -> Result<()> {
        let channels = self.info.channel_count as u64;
        // A declared total bounds the target; zero means unknown.
        let clamped = if self.info.sample_count > 0 {
            sample_offset.min(self.info.sample_count)
        } else {
            sample_offset
        };
        let frame = clamped / channels;
        let coarse = frame.saturating_sub(SEEK_BACKOFF_FRAMES);
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: coarse,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::Decode(format!("ogg seek failed: {e}")))?;
        self.decoder.reset();
        self.carry.clear();
        self.ended = false;
        // The demuxer lands on a packet boundary at or before the coarse
        // point; decode and discard up to the exact sample. Each pull
        // re-pins the position from the packet timestamp, so the drain
        // length is recomputed after every pull.
        self.position = seeked.actual_ts * channels;
        let target = frame * channels;
        while self.position < target {
            if self.carry.is_empty() {
                if self.ended || !self.pull_packet() {
                    break;
                }
                continue;
            }
            let drop = ((target - self.position) as usize).min(self.carry.len());
            self.carry.drain(..drop);
            self.position += drop as u64;
        }
        Ok(())
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let mut written = 0;
        while written < out.len() {
            if let Some(s) = self.carry.pop_front() {
                out[written] = s;
                written += 1;
                self.position += 1;
                continue;
            }
            if self.ended || !self.pull_packet() {
                break;
            }
        }
        Ok(written)
    }
}
