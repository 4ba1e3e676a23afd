//! Hardware device abstraction.
//!
//! The rest of the crate talks to audio hardware exclusively through the
//! [`Device`] trait: an OpenAL-shaped surface of device-resident PCM
//! buffers, playback voices with spatial parameters, buffer queueing for
//! streaming, and a single listener. Two backends are provided:
//!
//! - [`NullDevice`](null::NullDevice): headless, driven by a simulated
//!   sample clock. Deterministic enough for tests and for audio-free
//!   environments.
//! - [`CpalDevice`](cpal::CpalDevice) (feature `cpal-backend`): real output
//!   through the system audio API, mixing all voices internally.
//!
//! Backends report most errors asynchronously: a call that reaches invalid
//! state records a fault which [`Device::take_error`] retrieves later. The
//! crate polls this in debug builds after groups of device calls and logs
//! the result; it is diagnostic only, never control flow.

pub mod null;

#[cfg(feature = "cpal-backend")]
pub mod cpal;

pub use null::NullDevice;

use crate::error::Result;
use crate::state::PlaybackState;

/// Handle to a device-resident PCM buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Handle to a device playback voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// Sample layout of a device buffer. All device audio is interleaved
/// 16-bit PCM; only the channel count varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    Mono16,
    Stereo16,
}

impl BufferFormat {
    /// Maps a decoded channel count onto a device format. Counts other
    /// than 1 or 2 have no device representation.
    pub fn from_channel_count(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(BufferFormat::Mono16),
            2 => Some(BufferFormat::Stereo16),
            _ => None,
        }
    }

    pub fn channel_count(self) -> u16 {
        match self {
            BufferFormat::Mono16 => 1,
            BufferFormat::Stereo16 => 2,
        }
    }

    pub fn bits_per_sample(self) -> u16 {
        16
    }
}

/// Metadata the device reports for an uploaded buffer.
///
/// `sample_count` is interleaved samples, not frames. A backend that has
/// lost track of a buffer may report zero bits or channels; consumers must
/// treat that as corrupt metadata, not divide by it.
#[derive(Debug, Clone, Copy)]
pub struct BufferInfo {
    pub sample_count: u64,
    pub bits_per_sample: u16,
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// Low-level audio device.
///
/// All methods take `&self`; implementations guard their state internally
/// so one device instance can be shared across threads behind an `Arc`.
///
/// A voice is either *static* (bound to one buffer via
/// [`set_voice_buffer`](Device::set_voice_buffer)) or *queue-fed*
/// (buffers appended with [`queue_buffer`](Device::queue_buffer)); the two
/// modes are mutually exclusive on a given voice until the binding is
/// cleared. Sample offsets are interleaved samples measured from the start
/// of the current binding or queue; offsets of stopped voices read zero.
pub trait Device: Send + Sync {
    fn create_buffer(&self) -> Result<BufferId>;
    fn destroy_buffer(&self, buffer: BufferId) -> Result<()>;

    /// Replaces the buffer's content. The buffer must not be bound to or
    /// queued on any voice.
    fn buffer_data(
        &self,
        buffer: BufferId,
        format: BufferFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<()>;

    fn buffer_info(&self, buffer: BufferId) -> Result<BufferInfo>;

    fn create_voice(&self) -> Result<VoiceId>;
    fn destroy_voice(&self, voice: VoiceId) -> Result<()>;

    /// Binds one buffer for static playback, or clears the binding (and
    /// any queue) with `None`. Resets the voice's offset.
    fn set_voice_buffer(&self, voice: VoiceId, buffer: Option<BufferId>) -> Result<()>;

    /// Appends a buffer to the voice's queue. Fails on a static voice.
    fn queue_buffer(&self, voice: VoiceId, buffer: BufferId) -> Result<()>;

    /// Removes and returns the oldest fully-consumed queued buffer, or
    /// `None` if the front of the queue is still pending.
    fn unqueue_buffer(&self, voice: VoiceId) -> Result<Option<BufferId>>;

    /// Number of queued buffers the voice has fully consumed but not yet
    /// had unqueued.
    fn processed_buffer_count(&self, voice: VoiceId) -> Result<usize>;

    /// Drops every queued buffer and resets the voice's offset. The voice
    /// must be stopped.
    fn clear_queue(&self, voice: VoiceId) -> Result<()>;

    /// Starts or restarts playback. A paused voice resumes; a stopped or
    /// already-playing voice restarts from the beginning of its current
    /// binding or queue.
    fn play_voice(&self, voice: VoiceId) -> Result<()>;
    fn pause_voice(&self, voice: VoiceId) -> Result<()>;
    /// Stops playback; all queued buffers become consumed and the offset
    /// reads zero.
    fn stop_voice(&self, voice: VoiceId) -> Result<()>;

    /// Unknown voices report `Stopped`.
    fn voice_state(&self, voice: VoiceId) -> PlaybackState;

    /// Interleaved samples consumed within the current binding or queue;
    /// zero when stopped or unknown.
    fn voice_sample_offset(&self, voice: VoiceId) -> u64;
    fn set_voice_sample_offset(&self, voice: VoiceId, offset: u64) -> Result<()>;

    fn set_voice_gain(&self, voice: VoiceId, gain: f32) -> Result<()>;
    fn set_voice_pitch(&self, voice: VoiceId, pitch: f32) -> Result<()>;
    fn set_voice_position(&self, voice: VoiceId, position: [f32; 3]) -> Result<()>;
    fn set_voice_velocity(&self, voice: VoiceId, velocity: [f32; 3]) -> Result<()>;
    fn set_voice_direction(&self, voice: VoiceId, direction: [f32; 3]) -> Result<()>;
    /// When set, the voice's position is interpreted in listener space.
    fn set_voice_relative(&self, voice: VoiceId, relative: bool) -> Result<()>;
    fn set_voice_reference_distance(&self, voice: VoiceId, distance: f32) -> Result<()>;
    fn set_voice_rolloff(&self, voice: VoiceId, rolloff: f32) -> Result<()>;
    fn set_voice_looping(&self, voice: VoiceId, looping: bool) -> Result<()>;

    fn set_listener_position(&self, position: [f32; 3]);
    fn set_listener_velocity(&self, velocity: [f32; 3]);
    fn set_listener_orientation(&self, at: [f32; 3], up: [f32; 3]);
    fn set_master_gain(&self, gain: f32);

    /// Halts device processing without touching voice state.
    fn suspend(&self);
    fn resume(&self);

    /// Retrieves and clears the most recent asynchronous device fault.
    fn take_error(&self) -> Option<String>;
}

/// Polls the device's asynchronous error slot and logs anything found.
/// Compiled only into debug builds; the device reports faults out of band,
/// so this is a diagnostic aid placed after groups of device calls.
#[inline]
pub(crate) fn debug_check(device: &dyn Device, op: &str) {
    #[cfg(debug_assertions)]
    if let Some(err) = device.take_error() {
        tracing::warn!("audio device error after {op}: {err}");
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (device, op);
    }
}
