//! Shared audio context.
//!
//! An `AudioContext` is a cheaply clonable handle to one device plus the
//! listener state. Every playback resource holds a clone, so the device
//! stays alive until the last resource drops.

use std::sync::{Arc, Mutex};

use crate::device::{debug_check, Device, NullDevice};
use crate::error::Result;

#[derive(Clone)]
pub struct AudioContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    device: Arc<dyn Device>,
    listener: Mutex<ListenerSettings>,
}

/// Crate-side cache of listener values; the device trait is set-only.
struct ListenerSettings {
    position: [f32; 3],
    velocity: [f32; 3],
    at: [f32; 3],
    up: [f32; 3],
    volume: f32,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        ListenerSettings {
            position: [0.0; 3],
            velocity: [0.0; 3],
            at: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            volume: 1.0,
        }
    }
}

impl AudioContext {
    /// Opens the default backend.
    #[cfg(feature = "cpal-backend")]
    pub fn new() -> Result<Self> {
        Ok(Self::with_device(Arc::new(
            crate::device::cpal::CpalDevice::new()?,
        )))
    }

    /// Opens the default backend. Without an output feature this is the
    /// null device.
    #[cfg(not(feature = "cpal-backend"))]
    pub fn new() -> Result<Self> {
        Ok(Self::null())
    }

    /// Headless context over the simulated device. Playback advances in
    /// real time but produces no audio.
    pub fn null() -> Self {
        Self::with_device(Arc::new(NullDevice::new()))
    }

    pub fn with_device(device: Arc<dyn Device>) -> Self {
        AudioContext {
            inner: Arc::new(ContextInner {
                device,
                listener: Mutex::new(ListenerSettings::default()),
            }),
        }
    }

    pub(crate) fn device(&self) -> &Arc<dyn Device> {
        &self.inner.device
    }

    pub fn set_listener_position(&self, position: [f32; 3]) {
        self.inner.listener.lock().unwrap().position = position;
        self.inner.device.set_listener_position(position);
        debug_check(&*self.inner.device, "set_listener_position");
    }

    pub fn listener_position(&self) -> [f32; 3] {
        self.inner.listener.lock().unwrap().position
    }

    pub fn set_listener_velocity(&self, velocity: [f32; 3]) {
        self.inner.listener.lock().unwrap().velocity = velocity;
        self.inner.device.set_listener_velocity(velocity);
        debug_check(&*self.inner.device, "set_listener_velocity");
    }

    pub fn listener_velocity(&self) -> [f32; 3] {
        self.inner.listener.lock().unwrap().velocity
    }

    /// Orientation as a forward ("at") vector and an up vector.
    pub fn set_listener_orientation(&self, at: [f32; 3], up: [f32; 3]) {
        {
            let mut l = self.inner.listener.lock().unwrap();
            l.at = at;
            l.up = up;
        }
        self.inner.device.set_listener_orientation(at, up);
        debug_check(&*self.inner.device, "set_listener_orientation");
    }

    pub fn listener_orientation(&self) -> ([f32; 3], [f32; 3]) {
        let l = self.inner.listener.lock().unwrap();
        (l.at, l.up)
    }

    /// Master volume, 0.0 to 1.0. Applied after per-voice gain.
    pub fn set_master_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        self.inner.listener.lock().unwrap().volume = volume;
        self.inner.device.set_master_gain(volume);
        debug_check(&*self.inner.device, "set_master_gain");
    }

    pub fn master_volume(&self) -> f32 {
        self.inner.listener.lock().unwrap().volume
    }

    /// Halts device processing. Voice state is preserved; a suspended
    /// device does not advance playback positions.
    pub fn suspend(&self) {
        self.inner.device.suspend();
    }

    pub fn resume(&self) {
        self.inner.device.resume();
    }
}
