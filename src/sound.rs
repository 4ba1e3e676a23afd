//! Buffered playback.
//!
//! A `Sound` is one voice bound to at most one shared [`SoundBuffer`].
//! The buffer tracks its bound sounds weakly; when it is rewritten or
//! dropped it reaches back through `SoundCore` to stop and rebind or
//! detach them, so a sound never plays from a stale device buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tracing::warn;

use crate::buffer::{BufferInner, SoundBuffer};
use crate::context::AudioContext;
use crate::device::{debug_check, BufferId};
use crate::error::Result;
use crate::state::PlaybackState;
use crate::voice::Voice;

static NEXT_SOUND_ID: AtomicU64 = AtomicU64::new(1);

/// Shared body of a `Sound`; buffers hold these weakly in their
/// dependent registries.
pub(crate) struct SoundCore {
    id: u64,
    voice: Voice,
    bound: Mutex<Weak<BufferInner>>,
    looping: Mutex<bool>,
}

impl SoundCore {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn bound_buffer(&self) -> Option<Arc<BufferInner>> {
        self.bound.lock().unwrap().upgrade()
    }

    /// Stops playback and clears the device-side binding. The crate-side
    /// buffer reference stays, so a rewrite can rebind afterwards.
    pub(crate) fn suspend_binding(&self) {
        let device = self.voice.device();
        if let Err(e) = device.stop_voice(self.voice.id()) {
            warn!("sound {}: stop failed: {e}", self.id);
        }
        if let Err(e) = device.set_voice_buffer(self.voice.id(), None) {
            warn!("sound {}: unbind failed: {e}", self.id);
        }
    }

    /// Restores the device-side binding after a buffer rewrite.
    pub(crate) fn rebind(&self, hw: BufferId) {
        if let Err(e) = self.voice.device().set_voice_buffer(self.voice.id(), Some(hw)) {
            warn!("sound {}: rebind failed: {e}", self.id);
        }
    }

    /// Detaches from a buffer being torn down; the sound behaves as if
    /// no buffer were ever set.
    pub(crate) fn orphan(&self) {
        self.suspend_binding();
        *self.bound.lock().unwrap() = Weak::new();
    }
}

pub struct Sound {
    core: Arc<SoundCore>,
}

impl Sound {
    pub fn new(ctx: &AudioContext) -> Result<Self> {
        Ok(Sound {
            core: Arc::new(SoundCore {
                id: NEXT_SOUND_ID.fetch_add(1, Ordering::Relaxed),
                voice: Voice::new(ctx)?,
                bound: Mutex::new(Weak::new()),
                looping: Mutex::new(false),
            }),
        })
    }

    pub fn with_buffer(ctx: &AudioContext, buffer: &SoundBuffer) -> Result<Self> {
        let sound = Self::new(ctx)?;
        sound.set_buffer(buffer);
        Ok(sound)
    }

    /// Binds this sound to a buffer, stopping current playback and
    /// detaching from any previous buffer first.
    pub fn set_buffer(&self, buffer: &SoundBuffer) {
        self.core.suspend_binding();
        if let Some(old) = self.core.bound_buffer() {
            old.detach(self.core.id);
        }
        buffer
            .shared
            .attach(self.core.id, Arc::downgrade(&self.core));
        *self.core.bound.lock().unwrap() = Arc::downgrade(&buffer.shared);
        self.core.rebind(buffer.shared.hw());
    }

    /// Stops playback and leaves the sound with no buffer.
    pub fn clear_buffer(&self) {
        self.core.suspend_binding();
        if let Some(old) = self.core.bound_buffer() {
            old.detach(self.core.id);
        }
        *self.core.bound.lock().unwrap() = Weak::new();
    }

    /// Duration of the bound buffer, or zero without one.
    pub fn buffer_duration(&self) -> Duration {
        self.core
            .bound_buffer()
            .map(|b| b.duration())
            .unwrap_or(Duration::ZERO)
    }

    /// Starts playback from the beginning, or resumes when paused. A
    /// sound without a buffer stops immediately.
    pub fn play(&self) {
        let device = self.core.voice.device();
        if let Err(e) = device.play_voice(self.core.voice.id()) {
            warn!("sound {}: play failed: {e}", self.core.id);
        }
        debug_check(&**device, "sound play");
    }

    pub fn pause(&self) {
        let device = self.core.voice.device();
        if let Err(e) = device.pause_voice(self.core.voice.id()) {
            warn!("sound {}: pause failed: {e}", self.core.id);
        }
        debug_check(&**device, "sound pause");
    }

    pub fn stop(&self) {
        let device = self.core.voice.device();
        if let Err(e) = device.stop_voice(self.core.voice.id()) {
            warn!("sound {}: stop failed: {e}", self.core.id);
        }
        debug_check(&**device, "sound stop");
    }

    pub fn status(&self) -> PlaybackState {
        self.core.voice.device().voice_state(self.core.voice.id())
    }

    pub fn set_looping(&self, looping: bool) {
        *self.core.looping.lock().unwrap() = looping;
        let device = self.core.voice.device();
        if let Err(e) = device.set_voice_looping(self.core.voice.id(), looping) {
            warn!("sound {}: set_looping failed: {e}", self.core.id);
        }
    }

    pub fn is_looping(&self) -> bool {
        *self.core.looping.lock().unwrap()
    }

    /// Jumps to a time offset within the bound buffer, frame-aligned.
    /// Without a buffer this does nothing.
    pub fn set_playing_offset(&self, offset: Duration) {
        let Some(buffer) = self.core.bound_buffer() else {
            return;
        };
        let (channels, rate) = buffer.playback_params();
        let frame = (offset.as_secs_f64() * rate as f64) as u64;
        let device = self.core.voice.device();
        if let Err(e) =
            device.set_voice_sample_offset(self.core.voice.id(), frame * channels as u64)
        {
            warn!("sound {}: seek failed: {e}", self.core.id);
        }
    }

    pub fn playing_offset(&self) -> Duration {
        let Some(buffer) = self.core.bound_buffer() else {
            return Duration::ZERO;
        };
        let (channels, rate) = buffer.playback_params();
        if channels == 0 || rate == 0 {
            return Duration::ZERO;
        }
        let samples = self.core.voice.device().voice_sample_offset(self.core.voice.id());
        Duration::from_secs_f64(samples as f64 / (channels as u64 * rate as u64) as f64)
    }

    pub fn set_volume(&self, volume: f32) {
        self.core.voice.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.core.voice.volume()
    }

    pub fn set_pitch(&self, pitch: f32) {
        self.core.voice.set_pitch(pitch);
    }

    pub fn pitch(&self) -> f32 {
        self.core.voice.pitch()
    }

    pub fn set_position(&self, position: [f32; 3]) {
        self.core.voice.set_position(position);
    }

    pub fn position(&self) -> [f32; 3] {
        self.core.voice.position()
    }

    pub fn set_velocity(&self, velocity: [f32; 3]) {
        self.core.voice.set_velocity(velocity);
    }

    pub fn velocity(&self) -> [f32; 3] {
        self.core.voice.velocity()
    }

    pub fn set_direction(&self, direction: [f32; 3]) {
        self.core.voice.set_direction(direction);
    }

    pub fn direction(&self) -> [f32; 3] {
        self.core.voice.direction()
    }

    pub fn set_relative_to_listener(&self, relative: bool) {
        self.core.voice.set_relative_to_listener(relative);
    }

    pub fn is_relative_to_listener(&self) -> bool {
        self.core.voice.is_relative_to_listener()
    }

    pub fn set_min_distance(&self, distance: f32) {
        self.core.voice.set_min_distance(distance);
    }

    pub fn min_distance(&self) -> f32 {
        self.core.voice.min_distance()
    }

    pub fn set_attenuation(&self, attenuation: f32) {
        self.core.voice.set_attenuation(attenuation);
    }

    pub fn attenuation(&self) -> f32 {
        self.core.voice.attenuation()
    }
}

impl Drop for Sound {
    fn drop(&mut self) {
        // Leave the buffer's dependent registry before the voice goes.
        if let Some(buffer) = self.core.bound_buffer() {
            buffer.detach(self.core.id);
        }
    }
}
