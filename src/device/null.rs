//! Headless device backend driven by a simulated sample clock.
//!
//! `NullDevice` implements the full [`Device`] contract without touching
//! any audio hardware: voices "consume" their bound or queued buffers in
//! real time at `sample_rate × channels × pitch` interleaved samples per
//! second, transition to `Stopped` when they run out of data, and report
//! offsets and processed-buffer counts accordingly. Suspending the device
//! freezes the clock.
//!
//! Besides serving audio-free environments, this backend carries the test
//! hooks the suite needs: metadata corruption for a specific buffer,
//! injected asynchronous faults, and live resource counts.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::state::PlaybackState;

use super::{BufferFormat, BufferId, BufferInfo, Device, VoiceId};

pub struct NullDevice {
    state: Mutex<DeviceState>,
}

struct DeviceState {
    next_id: u64,
    buffers: HashMap<u64, BufferSlot>,
    voices: HashMap<u64, VoiceSlot>,
    suspended: bool,
    pending_error: Option<String>,
    listener_position: [f32; 3],
    listener_velocity: [f32; 3],
    listener_at: [f32; 3],
    listener_up: [f32; 3],
    master_gain: f32,
}

struct BufferSlot {
    sample_count: u64,
    format: BufferFormat,
    sample_rate: u32,
    corrupt: bool,
}

struct VoiceSlot {
    static_buffer: Option<u64>,
    queue: VecDeque<u64>,
    /// Interleaved samples belonging to buffers already unqueued from the
    /// front of the queue. Offsets are measured past this point.
    unqueued: u64,
    state: PlaybackState,
    /// Interleaved samples consumed since the current binding or restart,
    /// counted from the start of the queue including unqueued content.
    consumed: f64,
    started_at: Option<Instant>,
    gain: f32,
    pitch: f32,
    position: [f32; 3],
    velocity: [f32; 3],
    direction: [f32; 3],
    relative: bool,
    reference_distance: f32,
    rolloff: f32,
    looping: bool,
}

impl VoiceSlot {
    fn new() -> Self {
        VoiceSlot {
            static_buffer: None,
            queue: VecDeque::new(),
            unqueued: 0,
            state: PlaybackState::Stopped,
            consumed: 0.0,
            started_at: None,
            gain: 1.0,
            pitch: 1.0,
            position: [0.0; 3],
            velocity: [0.0; 3],
            direction: [0.0; 3],
            relative: false,
            reference_distance: 1.0,
            rolloff: 1.0,
            looping: false,
        }
    }
}

impl DeviceState {
    /// Total interleaved content length and consumption rate (interleaved
    /// samples per second, before pitch) for a voice's current binding.
    fn voice_content(&self, v: &VoiceSlot) -> (f64, f64) {
        if let Some(b) = v.static_buffer.and_then(|id| self.buffers.get(&id)) {
            let sps = b.sample_rate as f64 * b.format.channel_count() as f64;
            (b.sample_count as f64, sps)
        } else if !v.queue.is_empty() {
            let total: u64 = v.unqueued
                + v.queue
                    .iter()
                    .filter_map(|id| self.buffers.get(id))
                    .map(|b| b.sample_count)
                    .sum::<u64>();
            let sps = v
                .queue
                .front()
                .and_then(|id| self.buffers.get(id))
                .map(|b| b.sample_rate as f64 * b.format.channel_count() as f64)
                .unwrap_or(0.0);
            (total as f64, sps)
        } else {
            (0.0, 0.0)
        }
    }

    /// Advances a playing voice's clock and applies end-of-content
    /// transitions. Folds elapsed time into `consumed` so rate-affecting
    /// parameter changes take effect from the fold point.
    fn refresh_voice(&mut self, vid: u64, now: Instant) {
        let (total, sps) = match self.voices.get(&vid) {
            Some(v) => self.voice_content(v),
            None => return,
        };
        let suspended = self.suspended;
        let looping_static = self
            .voices
            .get(&vid)
            .map(|v| v.static_buffer.is_some() && v.looping)
            .unwrap_or(false);
        if let Some(v) = self.voices.get_mut(&vid) {
            if v.state != PlaybackState::Playing {
                return;
            }
            if let Some(start) = v.started_at {
                if !suspended {
                    let dt = now.duration_since(start).as_secs_f64();
                    v.consumed += dt * sps * v.pitch as f64;
                    v.started_at = Some(now);
                }
            }
            if total <= 0.0 {
                v.state = PlaybackState::Stopped;
                v.started_at = None;
                v.consumed = 0.0;
            } else if !looping_static && v.consumed >= total {
                v.consumed = total;
                v.state = PlaybackState::Stopped;
                v.started_at = None;
            }
        }
    }

    fn voice_mut(&mut self, vid: u64) -> Result<&mut VoiceSlot> {
        self.voices
            .get_mut(&vid)
            .ok_or_else(|| Error::Device(format!("unknown voice {vid}")))
    }
}

/// Copy of one voice's mixing parameters, readable by tests the way
/// `alGetSource*` exposes them on a real device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    pub gain: f32,
    pub pitch: f32,
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub direction: [f32; 3],
    pub relative: bool,
    pub reference_distance: f32,
    pub rolloff: f32,
    pub looping: bool,
}

/// Copy of the listener state, readable by tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenerParams {
    pub position: [f32; 3],
    pub velocity: [f32; 3],
    pub at: [f32; 3],
    pub up: [f32; 3],
    pub gain: f32,
}

impl NullDevice {
    pub fn new() -> Self {
        NullDevice {
            state: Mutex::new(DeviceState {
                next_id: 1,
                buffers: HashMap::new(),
                voices: HashMap::new(),
                suspended: false,
                pending_error: None,
                listener_position: [0.0; 3],
                listener_velocity: [0.0; 3],
                listener_at: [0.0, 0.0, -1.0],
                listener_up: [0.0, 1.0, 0.0],
                master_gain: 1.0,
            }),
        }
    }

    /// Marks a buffer so that `buffer_info` reports zero bits and channels,
    /// the corrupt-metadata condition streaming workers must survive.
    /// Cleared by the next `buffer_data` upload.
    pub fn corrupt_buffer_metadata(&self, buffer: BufferId) {
        let mut st = self.state.lock().unwrap();
        if let Some(b) = st.buffers.get_mut(&buffer.0) {
            b.corrupt = true;
        }
    }

    /// Plants an asynchronous fault for the next `take_error` poll.
    pub fn inject_error(&self, message: impl Into<String>) {
        self.state.lock().unwrap().pending_error = Some(message.into());
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn voice_count(&self) -> usize {
        self.state.lock().unwrap().voices.len()
    }

    pub fn queued_buffer_count(&self, voice: VoiceId) -> usize {
        let st = self.state.lock().unwrap();
        st.voices.get(&voice.0).map(|v| v.queue.len()).unwrap_or(0)
    }

    pub fn voice_params(&self, voice: VoiceId) -> Option<VoiceParams> {
        let st = self.state.lock().unwrap();
        st.voices.get(&voice.0).map(|v| VoiceParams {
            gain: v.gain,
            pitch: v.pitch,
            position: v.position,
            velocity: v.velocity,
            direction: v.direction,
            relative: v.relative,
            reference_distance: v.reference_distance,
            rolloff: v.rolloff,
            looping: v.looping,
        })
    }

    pub fn listener_params(&self) -> ListenerParams {
        let st = self.state.lock().unwrap();
        ListenerParams {
            position: st.listener_position,
            velocity: st.listener_velocity,
            at: st.listener_at,
            up: st.listener_up,
            gain: st.master_gain,
        }
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for NullDevice {
    fn create_buffer(&self) -> Result<BufferId> {
        let mut st = self.state.lock().unwrap();
        let id = st.next_id;
        st.next_id += 1;
        st.buffers.insert(
            id,
            BufferSlot {
                sample_count: 0,
                format: BufferFormat::Mono16,
                sample_rate: 0,
                corrupt: false,
            },
        );
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.buffers
            .remove(&buffer.0)
            .map(|_| ())
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))
    }

    fn buffer_data(
        &self,
        buffer: BufferId,
        format: BufferFormat,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let slot = st
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))?;
        slot.sample_count = samples.len() as u64;
        slot.format = format;
        slot.sample_rate = sample_rate;
        slot.corrupt = false;
        Ok(())
    }

    fn buffer_info(&self, buffer: BufferId) -> Result<BufferInfo> {
        let st = self.state.lock().unwrap();
        let slot = st
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))?;
        if slot.corrupt {
            return Ok(BufferInfo {
                sample_count: slot.sample_count,
                bits_per_sample: 0,
                channel_count: 0,
                sample_rate: slot.sample_rate,
            });
        }
        Ok(BufferInfo {
            sample_count: slot.sample_count,
            bits_per_sample: slot.format.bits_per_sample(),
            channel_count: slot.format.channel_count(),
            sample_rate: slot.sample_rate,
        })
    }

    fn create_voice(&self) -> Result<VoiceId> {
        let mut st = self.state.lock().unwrap();
        let id = st.next_id;
        st.next_id += 1;
        st.voices.insert(id, VoiceSlot::new());
        Ok(VoiceId(id))
    }

    fn destroy_voice(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        st.voices
            .remove(&voice.0)
            .map(|_| ())
            .ok_or_else(|| Error::Device(format!("unknown voice {}", voice.0)))
    }

    fn set_voice_buffer(&self, voice: VoiceId, buffer: Option<BufferId>) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        v.static_buffer = buffer.map(|b| b.0);
        v.queue.clear();
        v.unqueued = 0;
        v.consumed = 0.0;
        v.state = PlaybackState::Stopped;
        v.started_at = None;
        Ok(())
    }

    fn queue_buffer(&self, voice: VoiceId, buffer: BufferId) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        if v.static_buffer.is_some() {
            return Err(Error::Device(format!(
                "voice {} has a static buffer; queueing is invalid",
                voice.0
            )));
        }
        v.queue.push_back(buffer.0);
        Ok(())
    }

    fn unqueue_buffer(&self, voice: VoiceId) -> Result<Option<BufferId>> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let front_len = {
            let v = st
                .voices
                .get(&voice.0)
                .ok_or_else(|| Error::Device(format!("unknown voice {}", voice.0)))?;
            match v.queue.front() {
                Some(id) => st
                    .buffers
                    .get(id)
                    .map(|b| b.sample_count)
                    .unwrap_or(0),
                None => return Ok(None),
            }
        };
        let v = st.voice_mut(voice.0)?;
        let boundary = v.unqueued + front_len;
        // Consumption alone decides: stops mark content consumed, while
        // a never-played voice keeps its queue intact.
        if v.consumed >= boundary as f64 {
            let id = v.queue.pop_front();
            v.unqueued = boundary;
            Ok(id.map(BufferId))
        } else {
            Ok(None)
        }
    }

    fn processed_buffer_count(&self, voice: VoiceId) -> Result<usize> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let v = st
            .voices
            .get(&voice.0)
            .ok_or_else(|| Error::Device(format!("unknown voice {}", voice.0)))?;
        let mut cum = v.unqueued;
        let mut processed = 0;
        for id in &v.queue {
            let len = st.buffers.get(id).map(|b| b.sample_count).unwrap_or(0);
            cum += len;
            if v.consumed >= cum as f64 {
                processed += 1;
            } else {
                break;
            }
        }
        Ok(processed)
    }

    fn clear_queue(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        v.queue.clear();
        v.unqueued = 0;
        v.consumed = 0.0;
        Ok(())
    }

    fn play_voice(&self, voice: VoiceId) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let suspended = st.suspended;
        let v = st.voice_mut(voice.0)?;
        match v.state {
            PlaybackState::Paused => {
                v.state = PlaybackState::Playing;
                v.started_at = if suspended { None } else { Some(now) };
            }
            // Play restarts from the beginning of the current binding or
            // queue, including content consumed but not yet unqueued.
            PlaybackState::Stopped | PlaybackState::Playing => {
                v.consumed = if v.static_buffer.is_some() {
                    0.0
                } else {
                    v.unqueued as f64
                };
                v.state = PlaybackState::Playing;
                v.started_at = if suspended { None } else { Some(now) };
            }
        }
        Ok(())
    }

    fn pause_voice(&self, voice: VoiceId) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let v = st.voice_mut(voice.0)?;
        if v.state == PlaybackState::Playing {
            v.state = PlaybackState::Paused;
            v.started_at = None;
        }
        Ok(())
    }

    fn stop_voice(&self, voice: VoiceId) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let (total, _) = match st.voices.get(&voice.0) {
            Some(v) => st.voice_content(v),
            None => return Err(Error::Device(format!("unknown voice {}", voice.0))),
        };
        let v = st.voice_mut(voice.0)?;
        v.state = PlaybackState::Stopped;
        v.started_at = None;
        // Stopping marks all queued content consumed so it can be unqueued.
        v.consumed = total;
        Ok(())
    }

    fn voice_state(&self, voice: VoiceId) -> PlaybackState {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        st.voices
            .get(&voice.0)
            .map(|v| v.state)
            .unwrap_or(PlaybackState::Stopped)
    }

    fn voice_sample_offset(&self, voice: VoiceId) -> u64 {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let Some(v) = st.voices.get(&voice.0) else {
            return 0;
        };
        if v.state == PlaybackState::Stopped {
            return 0;
        }
        if let Some(b) = v.static_buffer.and_then(|id| st.buffers.get(&id)) {
            if v.looping && b.sample_count > 0 {
                (v.consumed as u64) % b.sample_count
            } else {
                (v.consumed as u64).min(b.sample_count)
            }
        } else {
            (v.consumed as u64).saturating_sub(v.unqueued)
        }
    }

    fn set_voice_sample_offset(&self, voice: VoiceId, offset: u64) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        let suspended = st.suspended;
        let v = st.voice_mut(voice.0)?;
        if v.static_buffer.is_some() {
            v.consumed = offset as f64;
        } else {
            v.consumed = (v.unqueued + offset) as f64;
        }
        if v.state == PlaybackState::Playing {
            v.started_at = if suspended { None } else { Some(now) };
        }
        Ok(())
    }

    fn set_voice_gain(&self, voice: VoiceId, gain: f32) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.gain = gain;
        Ok(())
    }

    fn set_voice_pitch(&self, voice: VoiceId, pitch: f32) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        // Fold elapsed time at the old pitch before the rate changes.
        st.refresh_voice(voice.0, now);
        st.voice_mut(voice.0)?.pitch = pitch;
        Ok(())
    }

    fn set_voice_position(&self, voice: VoiceId, position: [f32; 3]) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.position = position;
        Ok(())
    }

    fn set_voice_velocity(&self, voice: VoiceId, velocity: [f32; 3]) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.velocity = velocity;
        Ok(())
    }

    fn set_voice_direction(&self, voice: VoiceId, direction: [f32; 3]) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.direction = direction;
        Ok(())
    }

    fn set_voice_relative(&self, voice: VoiceId, relative: bool) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.relative = relative;
        Ok(())
    }

    fn set_voice_reference_distance(&self, voice: VoiceId, distance: f32) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.reference_distance = distance;
        Ok(())
    }

    fn set_voice_rolloff(&self, voice: VoiceId, rolloff: f32) -> Result<()> {
        self.state.lock().unwrap().voice_mut(voice.0)?.rolloff = rolloff;
        Ok(())
    }

    fn set_voice_looping(&self, voice: VoiceId, looping: bool) -> Result<()> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        st.refresh_voice(voice.0, now);
        st.voice_mut(voice.0)?.looping = looping;
        Ok(())
    }

    fn set_listener_position(&self, position: [f32; 3]) {
        self.state.lock().unwrap().listener_position = position;
    }

    fn set_listener_velocity(&self, velocity: [f32; 3]) {
        self.state.lock().unwrap().listener_velocity = velocity;
    }

    fn set_listener_orientation(&self, at: [f32; 3], up: [f32; 3]) {
        let mut st = self.state.lock().unwrap();
        st.listener_at = at;
        st.listener_up = up;
    }

    fn set_master_gain(&self, gain: f32) {
        self.state.lock().unwrap().master_gain = gain.max(0.0);
    }

    fn suspend(&self) {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        if st.suspended {
            return;
        }
        // Fold every playing voice's clock, then freeze.
        let ids: Vec<u64> = st.voices.keys().copied().collect();
        for id in ids {
            st.refresh_voice(id, now);
        }
        st.suspended = true;
        for v in st.voices.values_mut() {
            v.started_at = None;
        }
    }

    fn resume(&self) {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap();
        if !st.suspended {
            return;
        }
        st.suspended = false;
        for v in st.voices.values_mut() {
            if v.state == PlaybackState::Playing {
                v.started_at = Some(now);
            }
        }
    }

    fn take_error(&self) -> Option<String> {
        self.state.lock().unwrap().pending_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn mono_buffer(dev: &NullDevice, samples: usize, rate: u32) -> BufferId {
        let buf = dev.create_buffer().unwrap();
        dev.buffer_data(buf, BufferFormat::Mono16, &vec![0i16; samples], rate)
            .unwrap();
        buf
    }

    #[test]
    fn test_static_playback_runs_out() {
        let dev = NullDevice::new();
        let buf = mono_buffer(&dev, 400, 8000); // 50 ms
        let voice = dev.create_voice().unwrap();
        dev.set_voice_buffer(voice, Some(buf)).unwrap();
        dev.play_voice(voice).unwrap();
        assert_eq!(dev.voice_state(voice), PlaybackState::Playing);
        sleep(Duration::from_millis(120));
        assert_eq!(dev.voice_state(voice), PlaybackState::Stopped);
        assert_eq!(dev.voice_sample_offset(voice), 0);
    }

    #[test]
    fn test_static_looping_never_stops() {
        let dev = NullDevice::new();
        let buf = mono_buffer(&dev, 80, 8000); // 10 ms per lap
        let voice = dev.create_voice().unwrap();
        dev.set_voice_buffer(voice, Some(buf)).unwrap();
        dev.set_voice_looping(voice, true).unwrap();
        dev.play_voice(voice).unwrap();
        sleep(Duration::from_millis(60));
        assert_eq!(dev.voice_state(voice), PlaybackState::Playing);
        assert!(dev.voice_sample_offset(voice) < 80);
    }

    #[test]
    fn test_queue_processed_and_unqueue() {
        let dev = NullDevice::new();
        let a = mono_buffer(&dev, 800, 8000); // 100 ms each
        let b = mono_buffer(&dev, 800, 8000);
        let voice = dev.create_voice().unwrap();
        dev.queue_buffer(voice, a).unwrap();
        dev.queue_buffer(voice, b).unwrap();
        dev.play_voice(voice).unwrap();
        assert_eq!(dev.processed_buffer_count(voice).unwrap(), 0);
        sleep(Duration::from_millis(120));
        assert_eq!(dev.processed_buffer_count(voice).unwrap(), 1);
        assert_eq!(dev.unqueue_buffer(voice).unwrap(), Some(a));
        assert_eq!(dev.unqueue_buffer(voice).unwrap(), None);
        sleep(Duration::from_millis(120));
        // Queue exhausted: natural stop, remaining buffer processed.
        assert_eq!(dev.voice_state(voice), PlaybackState::Stopped);
        assert_eq!(dev.unqueue_buffer(voice).unwrap(), Some(b));
    }

    #[test]
    fn test_pause_holds_offset() {
        let dev = NullDevice::new();
        let buf = mono_buffer(&dev, 8000, 8000); // 1 s
        let voice = dev.create_voice().unwrap();
        dev.set_voice_buffer(voice, Some(buf)).unwrap();
        dev.play_voice(voice).unwrap();
        sleep(Duration::from_millis(40));
        dev.pause_voice(voice).unwrap();
        let at_pause = dev.voice_sample_offset(voice);
        assert!(at_pause > 0);
        sleep(Duration::from_millis(40));
        assert_eq!(dev.voice_sample_offset(voice), at_pause);
        assert_eq!(dev.voice_state(voice), PlaybackState::Paused);
    }

    #[test]
    fn test_suspend_freezes_clock() {
        let dev = NullDevice::new();
        let buf = mono_buffer(&dev, 8000, 8000);
        let voice = dev.create_voice().unwrap();
        dev.set_voice_buffer(voice, Some(buf)).unwrap();
        dev.play_voice(voice).unwrap();
        sleep(Duration::from_millis(30));
        dev.suspend();
        let frozen = dev.voice_sample_offset(voice);
        sleep(Duration::from_millis(40));
        assert_eq!(dev.voice_sample_offset(voice), frozen);
        assert_eq!(dev.voice_state(voice), PlaybackState::Playing);
        dev.resume();
        sleep(Duration::from_millis(30));
        assert!(dev.voice_sample_offset(voice) > frozen);
    }

    #[test]
    fn test_corrupt_metadata_reports_zero_bits() {
        let dev = NullDevice::new();
        let buf = mono_buffer(&dev, 100, 8000);
        dev.corrupt_buffer_metadata(buf);
        let info = dev.buffer_info(buf).unwrap();
        assert_eq!(info.bits_per_sample, 0);
        assert_eq!(info.channel_count, 0);
    }

    #[test]
    fn test_injected_error_is_taken_once() {
        let dev = NullDevice::new();
        dev.inject_error("simulated fault");
        assert_eq!(dev.take_error().as_deref(), Some("simulated fault"));
        assert_eq!(dev.take_error(), None);
    }

    #[test]
    fn test_unplayed_queue_reports_nothing_processed() {
        let dev = NullDevice::new();
        let a = mono_buffer(&dev, 800, 8000);
        let voice = dev.create_voice().unwrap();
        dev.queue_buffer(voice, a).unwrap();
        assert_eq!(dev.processed_buffer_count(voice).unwrap(), 0);
        assert_eq!(dev.unqueue_buffer(voice).unwrap(), None);
    }

    #[test]
    fn test_stop_marks_queue_processed() {
        let dev = NullDevice::new();
        let a = mono_buffer(&dev, 8000, 8000);
        let voice = dev.create_voice().unwrap();
        dev.queue_buffer(voice, a).unwrap();
        dev.play_voice(voice).unwrap();
        dev.stop_voice(voice).unwrap();
        assert_eq!(dev.processed_buffer_count(voice).unwrap(), 1);
        assert_eq!(dev.unqueue_buffer(voice).unwrap(), Some(a));
        assert_eq!(dev.voice_sample_offset(voice), 0);
    }

    #[test]
    fn test_voice_params_reflect_setters() {
        let dev = NullDevice::new();
        let voice = dev.create_voice().unwrap();
        dev.set_voice_gain(voice, 0.25).unwrap();
        dev.set_voice_pitch(voice, 1.5).unwrap();
        dev.set_voice_position(voice, [1.0, 2.0, 3.0]).unwrap();
        dev.set_voice_velocity(voice, [0.0, 0.5, 0.0]).unwrap();
        dev.set_voice_direction(voice, [0.0, 0.0, -1.0]).unwrap();
        dev.set_voice_relative(voice, true).unwrap();
        dev.set_voice_reference_distance(voice, 2.0).unwrap();
        dev.set_voice_rolloff(voice, 0.5).unwrap();
        dev.set_voice_looping(voice, true).unwrap();
        let p = dev.voice_params(voice).unwrap();
        assert_eq!(p.gain, 0.25);
        assert_eq!(p.pitch, 1.5);
        assert_eq!(p.position, [1.0, 2.0, 3.0]);
        assert_eq!(p.velocity, [0.0, 0.5, 0.0]);
        assert_eq!(p.direction, [0.0, 0.0, -1.0]);
        assert!(p.relative);
        assert_eq!(p.reference_distance, 2.0);
        assert_eq!(p.rolloff, 0.5);
        assert!(p.looping);
        assert_eq!(dev.voice_params(VoiceId(99)), None);
    }

    #[test]
    fn test_listener_params_reflect_setters() {
        let dev = NullDevice::new();
        dev.set_listener_position([4.0, 0.0, 0.0]);
        dev.set_listener_velocity([0.0, 1.0, 0.0]);
        dev.set_listener_orientation([0.0, 0.0, 1.0], [0.0, 1.0, 0.0]);
        dev.set_master_gain(0.5);
        let l = dev.listener_params();
        assert_eq!(l.position, [4.0, 0.0, 0.0]);
        assert_eq!(l.velocity, [0.0, 1.0, 0.0]);
        assert_eq!(l.at, [0.0, 0.0, 1.0]);
        assert_eq!(l.up, [0.0, 1.0, 0.0]);
        assert_eq!(l.gain, 0.5);
    }
}
