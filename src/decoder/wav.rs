//! WAV (RIFF) decoder.
//!
//! Parses the container by hand: 12-byte `RIFF....WAVE` header, then a
//! chunk walk (4-byte id + little-endian u32 size) that skips unknown
//! chunks. Only PCM (format code 1) at 8, 16, 24, or 32 bits per sample
//! is accepted; everything normalizes to interleaved `i16` on read.

use std::io::{Read, Seek, SeekFrom};

use symphonia::core::io::MediaSource;

use crate::error::{Error, Result};

use super::{Decoder, DecoderFactory, SoundInfo};

pub struct WavFactory;

impl DecoderFactory for WavFactory {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn check(&self, stream: &mut dyn MediaSource) -> bool {
        let mut header = [0u8; 12];
        if stream.read_exact(&mut header).is_err() {
            return false;
        }
        &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE"
    }

    fn open(&self, stream: Box<dyn MediaSource>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(WavDecoder::open(stream)?))
    }
}

pub struct WavDecoder {
    stream: Box<dyn MediaSource>,
    info: SoundInfo,
    bytes_per_sample: u64,
    /// Stream offset of the first payload byte.
    data_start: u64,
    /// Interleaved index of the next sample `read` will return.
    next_sample: u64,
}

impl WavDecoder {
    pub fn open(mut stream: Box<dyn MediaSource>) -> Result<Self> {
        let mut header = [0u8; 12];
        stream
            .read_exact(&mut header)
            .map_err(|_| Error::Format("truncated RIFF header".into()))?;
        if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
            return Err(Error::Format("missing RIFF/WAVE magic".into()));
        }

        let mut fmt: Option<(u16, u32, u16)> = None;
        loop {
            let mut chunk = [0u8; 8];
            if stream.read_exact(&mut chunk).is_err() {
                // Ran off the end without seeing a data chunk.
                return Err(Error::Format("WAV has no data chunk".into()));
            }
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as u64;
            // RIFF chunks are word-aligned; odd sizes carry a pad byte.
            let padded = size + (size & 1);
            match &chunk[0..4] {
                b"fmt " => {
                    if size < 16 {
                        return Err(Error::Format("WAV format chunk too small".into()));
                    }
                    let mut body = [0u8; 16];
                    stream
                        .read_exact(&mut body)
                        .map_err(|_| Error::Format("truncated WAV format chunk".into()))?;
                    let format_code = u16::from_le_bytes([body[0], body[1]]);
                    if format_code != 1 {
                        return Err(Error::Format(format!(
                            "unsupported WAV codec {format_code}; only PCM is supported"
                        )));
                    }
                    let channels = u16::from_le_bytes([body[2], body[3]]);
                    let rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                    let bits = u16::from_le_bytes([body[14], body[15]]);
                    if !matches!(bits, 8 | 16 | 24 | 32) {
                        return Err(Error::Format(format!(
                            "unsupported WAV bit depth {bits}"
                        )));
                    }
                    if channels == 0 {
                        return Err(Error::Format("WAV declares zero channels".into()));
                    }
                    if rate == 0 {
                        return Err(Error::Format("WAV declares zero sample rate".into()));
                    }
                    fmt = Some((channels, rate, bits));
                    let extra = padded - 16;
                    if extra > 0 {
                        stream.seek(SeekFrom::Current(extra as i64))?;
                    }
                }
                b"data" => {
                    let (channels, rate, bits) = fmt.ok_or_else(|| {
                        Error::Format("WAV data chunk precedes format chunk".into())
                    })?;
                    let bytes_per_sample = (bits / 8) as u64;
                    let data_start = stream.stream_position()?;
                    return Ok(WavDecoder {
                        stream,
                        info: SoundInfo {
                            sample_count: size / bytes_per_sample,
                            channel_count: channels,
                            sample_rate: rate,
                        },
                        bytes_per_sample,
                        data_start,
                        next_sample: 0,
                    });
                }
                _ => {
                    stream.seek(SeekFrom::Current(padded as i64))?;
                }
            }
        }
    }
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn read_fully(stream: &mut dyn MediaSource, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match stream.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

impl Decoder for WavDecoder {
    fn info(&self) -> SoundInfo {
        self.info
    }

    fn seek(&mut self, sample_offset: u64) -> Result<()> {
        let target = sample_offset.min(self.info.sample_count);
        self.stream.seek(SeekFrom::Start(
            self.data_start + target * self.bytes_per_sample,
        ))?;
        self.next_sample = target;
        Ok(())
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let remaining = self.info.sample_count.saturating_sub(self.next_sample);
        let want = (out.len() as u64).min(remaining) as usize;
        if want == 0 {
            return Ok(0);
        }
        let bps = self.bytes_per_sample as usize;
        let mut raw = vec![0u8; want * bps];
        let got_bytes = read_fully(self.stream.as_mut(), &mut raw)?;
        let got = got_bytes / bps;
        for (i, slot) in out[..got].iter_mut().enumerate() {
            let b = &raw[i * bps..];
            *slot = match bps {
                // 8-bit WAV is unsigned; center then scale up.
                1 => ((b[0] as i16) - 128) << 8,
                2 => i16::from_le_bytes([b[0], b[1]]),
                // Top 16 bits of the little-endian value.
                3 => i16::from_le_bytes([b[1], b[2]]),
                _ => i16::from_le_bytes([b[2], b[3]]),
            };
        }
        self.next_sample += got as u64;
        Ok(got)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds a minimal WAV byte image: RIFF header, optional leading
    /// junk chunk, fmt chunk, data chunk with the given payload.
    fn wav_image(bits: u16, channels: u16, rate: u32, payload: &[u8]) -> Vec<u8> {
        wav_image_with(bits, channels, rate, payload, &[], 1)
    }

    fn wav_image_with(
        bits: u16,
        channels: u16,
        rate: u32,
        payload: &[u8],
        junk: &[u8],
        format_code: u16,
    ) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&0u32.to_le_bytes()); // size not verified
        v.extend_from_slice(b"WAVE");
        if !junk.is_empty() {
            v.extend_from_slice(b"JUNK");
            v.extend_from_slice(&(junk.len() as u32).to_le_bytes());
            v.extend_from_slice(junk);
            if junk.len() % 2 == 1 {
                v.push(0); // pad byte
            }
        }
        let byte_rate = rate * channels as u32 * (bits / 8) as u32;
        let block_align = channels * (bits / 8);
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&format_code.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        v.extend_from_slice(&byte_rate.to_le_bytes());
        v.extend_from_slice(&block_align.to_le_bytes());
        v.extend_from_slice(&bits.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(payload);
        v
    }

    fn open(bytes: Vec<u8>) -> Result<WavDecoder> {
        WavDecoder::open(Box::new(Cursor::new(bytes)))
    }

    #[test]
    fn test_check_accepts_riff_wave() {
        let bytes = wav_image(16, 1, 44100, &[0, 0]);
        let mut cursor = Cursor::new(bytes);
        assert!(WavFactory.check(&mut cursor));
    }

    #[test]
    fn test_check_rejects_other_bytes() {
        let mut cursor = Cursor::new(b"OggS\x00\x02garbagegarbage".to_vec());
        assert!(!WavFactory.check(&mut cursor));
        let mut short = Cursor::new(b"RIFF".to_vec());
        assert!(!WavFactory.check(&mut short));
    }

    #[test]
    fn test_decodes_8_bit_unsigned() {
        let mut dec = open(wav_image(8, 1, 8000, &[0, 128, 255])).unwrap();
        assert_eq!(dec.info().sample_count, 3);
        let mut out = [0i16; 3];
        assert_eq!(dec.read(&mut out).unwrap(), 3);
        assert_eq!(out, [-32768, 0, 32512]);
    }

    #[test]
    fn test_decodes_16_bit_passthrough() {
        let payload = [0x34, 0x12, 0x00, 0x80];
        let mut dec = open(wav_image(16, 2, 44100, &payload)).unwrap();
        let info = dec.info();
        assert_eq!(info.sample_count, 2);
        assert_eq!(info.channel_count, 2);
        assert_eq!(info.sample_rate, 44100);
        let mut out = [0i16; 2];
        assert_eq!(dec.read(&mut out).unwrap(), 2);
        assert_eq!(out, [0x1234, i16::MIN]);
    }

    #[test]
    fn test_decodes_24_bit_top_bits() {
        let payload = [0xAA, 0xCD, 0xAB];
        let mut dec = open(wav_image(24, 1, 48000, &payload)).unwrap();
        let mut out = [0i16; 1];
        assert_eq!(dec.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], i16::from_le_bytes([0xCD, 0xAB]));
    }

    #[test]
    fn test_decodes_32_bit_top_bits() {
        let payload = [0x01, 0x02, 0x78, 0x56];
        let mut dec = open(wav_image(32, 1, 48000, &payload)).unwrap();
        let mut out = [0i16; 1];
        assert_eq!(dec.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], 0x5678);
    }

    #[test]
    fn test_skips_unknown_chunks() {
        let bytes = wav_image_with(16, 1, 22050, &[0x01, 0x00], b"xyz", 1);
        let mut dec = open(bytes).unwrap();
        let mut out = [0i16; 1];
        assert_eq!(dec.read(&mut out).unwrap(), 1);
        assert_eq!(out[0], 1);
    }

    #[test]
    fn test_rejects_data_before_fmt() {
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(b"WAVE");
        v.extend_from_slice(b"data");
        v.extend_from_slice(&2u32.to_le_bytes());
        v.extend_from_slice(&[0, 0]);
        assert!(matches!(open(v), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_missing_data_chunk() {
        let mut bytes = wav_image(16, 1, 44100, &[]);
        bytes.truncate(bytes.len() - 8); // drop the data chunk header
        assert!(matches!(open(bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_non_pcm() {
        let bytes = wav_image_with(16, 1, 44100, &[0, 0], &[], 3);
        assert!(matches!(open(bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_bad_bit_depth() {
        let bytes = wav_image(12, 1, 44100, &[0, 0]);
        assert!(matches!(open(bytes), Err(Error::Format(_))));
    }

    #[test]
    fn test_rejects_truncated_header() {
        assert!(matches!(open(b"RIFFxx".to_vec()), Err(Error::Format(_))));
        assert!(matches!(
            open(b"RIFFxxxxJUNK".to_vec()),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_seek_repositions_reads() {
        let payload: Vec<u8> = (0u16..8)
            .flat_map(|s| (s as i16).to_le_bytes())
            .collect();
        let mut dec = open(wav_image(16, 1, 8000, &payload)).unwrap();
        dec.seek(5).unwrap();
        let mut out = [0i16; 8];
        assert_eq!(dec.read(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[5, 6, 7]);
        // Past-the-end seeks clamp; the next read reports end of stream.
        dec.seek(100).unwrap();
        assert_eq!(dec.read(&mut out).unwrap(), 0);
        dec.seek(0).unwrap();
        assert_eq!(dec.read(&mut out).unwrap(), 8);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_truncated_payload_reads_short() {
        // Declares 4 samples but carries bytes for 2.
        let mut bytes = wav_image(16, 1, 8000, &[1, 0, 2, 0]);
        let len = bytes.len();
        bytes[len - 8..len - 4].copy_from_slice(&8u32.to_le_bytes());
        let mut dec = open(bytes).unwrap();
        assert_eq!(dec.info().sample_count, 4);
        let mut out = [0i16; 4];
        assert_eq!(dec.read(&mut out).unwrap(), 2);
        assert_eq!(dec.read(&mut out).unwrap(), 0);
    }
}
