//! Crate-internal wrapper around one hardware voice.
//!
//! `Sound` and `SoundStream` both compose a `Voice` for the shared spatial
//! parameter surface. The wrapper owns the device voice for its lifetime
//! and caches parameter values so getters never touch the device.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::context::AudioContext;
use crate::device::{debug_check, Device, VoiceId};
use crate::error::Result;

pub(crate) struct Voice {
    ctx: AudioContext,
    id: VoiceId,
    params: Mutex<VoiceParams>,
}

#[derive(Clone, Copy)]
struct VoiceParams {
    volume: f32,
    pitch: f32,
    position: [f32; 3],
    velocity: [f32; 3],
    direction: [f32; 3],
    relative: bool,
    min_distance: f32,
    attenuation: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        VoiceParams {
            volume: 1.0,
            pitch: 1.0,
            position: [0.0; 3],
            velocity: [0.0; 3],
            direction: [0.0; 3],
            relative: false,
            min_distance: 1.0,
            attenuation: 1.0,
        }
    }
}

impl Voice {
    pub fn new(ctx: &AudioContext) -> Result<Self> {
        let id = ctx.device().create_voice()?;
        Ok(Voice {
            ctx: ctx.clone(),
            id,
            params: Mutex::new(VoiceParams::default()),
        })
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        self.ctx.device()
    }

    /// Applies a device parameter, logging rather than failing. The voice
    /// is alive for the lifetime of `self`, so errors here only reflect a
    /// misbehaving device.
    fn apply(&self, op: &str, result: Result<()>) {
        if let Err(e) = result {
            warn!("voice {}: {op} failed: {e}", self.id.0);
        }
        debug_check(&**self.ctx.device(), op);
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.params.lock().unwrap().volume = volume;
        self.apply("set_volume", self.device().set_voice_gain(self.id, volume));
    }

    pub fn volume(&self) -> f32 {
        self.params.lock().unwrap().volume
    }

    pub fn set_pitch(&self, pitch: f32) {
        let pitch = pitch.max(0.0);
        self.params.lock().unwrap().pitch = pitch;
        self.apply("set_pitch", self.device().set_voice_pitch(self.id, pitch));
    }

    pub fn pitch(&self) -> f32 {
        self.params.lock().unwrap().pitch
    }

    pub fn set_position(&self, position: [f32; 3]) {
        self.params.lock().unwrap().position = position;
        self.apply(
            "set_position",
            self.device().set_voice_position(self.id, position),
        );
    }

    pub fn position(&self) -> [f32; 3] {
        self.params.lock().unwrap().position
    }

    pub fn set_velocity(&self, velocity: [f32; 3]) {
        self.params.lock().unwrap().velocity = velocity;
        self.apply(
            "set_velocity",
            self.device().set_voice_velocity(self.id, velocity),
        );
    }

    pub fn velocity(&self) -> [f32; 3] {
        self.params.lock().unwrap().velocity
    }

    pub fn set_direction(&self, direction: [f32; 3]) {
        self.params.lock().unwrap().direction = direction;
        self.apply(
            "set_direction",
            self.device().set_voice_direction(self.id, direction),
        );
    }

    pub fn direction(&self) -> [f32; 3] {
        self.params.lock().unwrap().direction
    }

    pub fn set_relative_to_listener(&self, relative: bool) {
        self.params.lock().unwrap().relative = relative;
        self.apply(
            "set_relative",
            self.device().set_voice_relative(self.id, relative),
        );
    }

    pub fn is_relative_to_listener(&self) -> bool {
        self.params.lock().unwrap().relative
    }

    /// Distance under which the voice plays at full volume.
    pub fn set_min_distance(&self, distance: f32) {
        let distance = distance.max(0.0);
        self.params.lock().unwrap().min_distance = distance;
        self.apply(
            "set_min_distance",
            self.device().set_voice_reference_distance(self.id, distance),
        );
    }

    pub fn min_distance(&self) -> f32 {
        self.params.lock().unwrap().min_distance
    }

    /// Attenuation factor: 0 disables distance attenuation, larger values
    /// fade the voice faster with distance.
    pub fn set_attenuation(&self, attenuation: f32) {
        let attenuation = attenuation.max(0.0);
        self.params.lock().unwrap().attenuation = attenuation;
        self.apply(
            "set_attenuation",
            self.device().set_voice_rolloff(self.id, attenuation),
        );
    }

    pub fn attenuation(&self) -> f32 {
        self.params.lock().unwrap().attenuation
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        let device = self.ctx.device();
        if let Err(e) = device.stop_voice(self.id) {
            warn!("voice {}: stop on drop failed: {e}", self.id.0);
        }
        if let Err(e) = device.destroy_voice(self.id) {
            warn!("voice {}: destroy failed: {e}", self.id.0);
        }
    }
}
