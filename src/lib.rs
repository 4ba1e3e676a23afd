//! # soundfield
//!
//! Spatialized audio playback: one-shot sounds over shared decoded
//! buffers, plus background-thread streaming for long sources.
//!
//! **Purpose:** Decode WAV and Ogg/Vorbis sources into 16-bit PCM, play
//! them through positional voices, and keep long sources streaming over
//! a small rotating buffer set without decoding them fully.
//!
//! **Architecture:** symphonia for Ogg/Vorbis, a hand-parsed WAV reader,
//! and a pluggable `Device` trait with a cpal mixer backend and a
//! simulated null backend for headless use.

pub mod buffer;
pub mod cache;
pub mod context;
pub mod decoder;
pub mod device;
pub mod error;
pub mod file;
pub mod sound;
pub mod state;
pub mod stream;
mod voice;

pub use buffer::SoundBuffer;
pub use cache::SoundCache;
pub use context::AudioContext;
pub use error::{Error, Result};
pub use file::SoundFile;
pub use sound::Sound;
pub use state::PlaybackState;
pub use stream::SoundStream;
