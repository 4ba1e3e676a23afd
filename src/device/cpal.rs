//! Real audio output through cpal.
//!
//! The stream handle cpal hands back is not `Send`, so a dedicated manager
//! thread owns it; `suspend`/`resume`/shutdown reach that thread over a
//! command channel. Everything else (buffers, voices, the listener) lives
//! in a mixer state shared with the output callback behind a mutex the
//! callback locks once per invocation.
//!
//! Mixing happens here, in the device layer: per-voice linear-interpolation
//! rate conversion (source rate × pitch → device rate), inverse-distance
//! attenuation and constant-power panning for mono voices, plain gain for
//! stereo voices (stereo content bypasses spatialization), master gain
//! last. A queue-fed voice that runs out of data transitions to `Stopped`,
//! which is what streaming callers detect as an underrun.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::state::PlaybackState;

use super::{BufferFormat, BufferId, BufferInfo, Device, VoiceId};

enum StreamCommand {
    Suspend,
    Resume,
    Shutdown,
}

pub struct CpalDevice {
    mixer: Arc<Mutex<MixerState>>,
    fault: Arc<Mutex<Option<String>>>,
    commands: Sender<StreamCommand>,
    manager: Option<JoinHandle<()>>,
}

/// Immutable view of one buffer's content, captured when the buffer is
/// bound or queued. Rewriting a buffer never touches captured views, so a
/// voice can safely outlive `destroy_buffer` on something it still plays.
#[derive(Clone)]
struct Snapshot {
    buffer: u64,
    samples: Arc<Vec<i16>>,
    channels: usize,
    rate: u32,
}

struct MixBuffer {
    samples: Arc<Vec<i16>>,
    format: BufferFormat,
    sample_rate: u32,
}

struct ListenerState {
    position: [f32; 3],
    #[allow(dead_code)] // no doppler model
    velocity: [f32; 3],
    at: [f32; 3],
    up: [f32; 3],
    gain: f32,
}

struct MixVoice {
    static_src: Option<Snapshot>,
    queue: VecDeque<Snapshot>,
    /// Index of the entry currently playing; entries before it are
    /// consumed but remain queued until unqueued.
    entry_idx: usize,
    /// Fractional frame position within the current entry or static
    /// buffer.
    frame_pos: f64,
    state: PlaybackState,
    gain: f32,
    pitch: f32,
    position: [f32; 3],
    #[allow(dead_code)] // no doppler model
    velocity: [f32; 3],
    #[allow(dead_code)] // no cone model
    direction: [f32; 3],
    relative: bool,
    reference_distance: f32,
    rolloff: f32,
    looping: bool,
}

impl MixVoice {
    fn new() -> Self {
        MixVoice {
            static_src: None,
            queue: VecDeque::new(),
            entry_idx: 0,
            frame_pos: 0.0,
            state: PlaybackState::Stopped,
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

    /// Interleaved samples consumed within the current binding or queue.
    fn sample_offset(&self) -> u64 {
        if self.state == PlaybackState::Stopped {
            return 0;
        }
        if let Some(s) = &self.static_src {
            return self.frame_pos as u64 * s.channels as u64;
        }
        let mut consumed: u64 = 0;
        for (i, entry) in self.queue.iter().enumerate() {
            if i < self.entry_idx {
                consumed += entry.samples.len() as u64;
            } else {
                consumed += self.frame_pos as u64 * entry.channels as u64;
                break;
            }
        }
        consumed
    }
}

struct MixerState {
    next_id: u64,
    buffers: HashMap<u64, MixBuffer>,
    voices: HashMap<u64, MixVoice>,
    listener: ListenerState,
    /// Scratch accumulator reused across callbacks.
    mix: Vec<f32>,
}

impl MixerState {
    fn new() -> Self {
        MixerState {
            next_id: 1,
            buffers: HashMap::new(),
            voices: HashMap::new(),
            listener: ListenerState {
                position: [0.0; 3],
                velocity: [0.0; 3],
                at: [0.0, 0.0, -1.0],
                up: [0.0, 1.0, 0.0],
                gain: 1.0,
            },
            mix: Vec::new(),
        }
    }

    fn voice_mut(&mut self, vid: u64) -> Result<&mut MixVoice> {
        self.voices
            .get_mut(&vid)
            .ok_or_else(|| Error::Device(format!("unknown voice {vid}")))
    }

    fn snapshot(&self, buffer: BufferId) -> Result<Snapshot> {
        let b = self
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))?;
        Ok(Snapshot {
            buffer: buffer.0,
            samples: b.samples.clone(),
            channels: b.format.channel_count() as usize,
            rate: b.sample_rate,
        })
    }

    fn render<T>(&mut self, out_rate: u32, out_channels: usize, out: &mut [T])
    where
        T: SizedSample + FromSample<f32>,
    {
        let MixerState {
            voices,
            listener,
            mix,
            ..
        } = self;
        if mix.len() != out.len() {
            mix.resize(out.len(), 0.0);
        }
        mix.fill(0.0);
        let frames = if out_channels == 0 {
            0
        } else {
            out.len() / out_channels
        };
        let right = listener_right(listener.at, listener.up);
        for voice in voices.values_mut() {
            mix_voice(voice, listener, right, out_rate, out_channels, frames, mix);
        }
        for (o, s) in out.iter_mut().zip(mix.iter()) {
            *o = T::from_sample(s.clamp(-1.0, 1.0));
        }
    }
}

/// Left/right gains for a mono voice: inverse-distance-clamped attenuation
/// and constant-power pan against the listener's right axis. A relative
/// voice's position is already in listener space.
fn spatial_gains(voice: &MixVoice, listener: &ListenerState, right: [f32; 3]) -> (f32, f32) {
    let rel = if voice.relative {
        voice.position
    } else {
        [
            voice.position[0] - listener.position[0],
            voice.position[1] - listener.position[1],
            voice.position[2] - listener.position[2],
        ]
    };
    let dist = (rel[0] * rel[0] + rel[1] * rel[1] + rel[2] * rel[2]).sqrt();
    let refd = voice.reference_distance.max(1e-6);
    let clamped = dist.max(refd);
    let atten = refd / (refd + voice.rolloff.max(0.0) * (clamped - refd));
    let pan = if dist > 1e-6 {
        ((rel[0] * right[0] + rel[1] * right[1] + rel[2] * right[2]) / dist).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let g = voice.gain * atten;
    (g * ((1.0 - pan) * 0.5).sqrt(), g * ((1.0 + pan) * 0.5).sqrt())
}

fn listener_right(at: [f32; 3], up: [f32; 3]) -> [f32; 3] {
    let r = [
        at[1] * up[2] - at[2] * up[1],
        at[2] * up[0] - at[0] * up[2],
        at[0] * up[1] - at[1] * up[0],
    ];
    let len = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
    if len > 1e-6 {
        [r[0] / len, r[1] / len, r[2] / len]
    } else {
        [1.0, 0.0, 0.0]
    }
}

fn mix_voice(
    voice: &mut MixVoice,
    listener: &ListenerState,
    right: [f32; 3],
    out_rate: u32,
    out_channels: usize,
    frames: usize,
    mix: &mut [f32],
) {
    if voice.state != PlaybackState::Playing || out_channels == 0 {
        return;
    }
    let master = listener.gain.max(0.0);
    let mut f = 0;
    while f < frames && voice.state == PlaybackState::Playing {
        // Resolve the current content block once per entry.
        let snap = if let Some(s) = &voice.static_src {
            Some((s.samples.clone(), s.channels, s.rate))
        } else {
            voice
                .queue
                .get(voice.entry_idx)
                .map(|s| (s.samples.clone(), s.channels, s.rate))
        };
        let Some((samples, src_ch, src_rate)) = snap else {
            voice.state = PlaybackState::Stopped;
            voice.frame_pos = 0.0;
            if voice.static_src.is_none() {
                voice.entry_idx = voice.queue.len();
            }
            break;
        };
        let src_frames = samples.len() / src_ch.max(1);
        if src_frames == 0 {
            if !advance_entry(voice, 0.0) {
                break;
            }
            continue;
        }
        let step = src_rate as f64 * voice.pitch.max(0.0) as f64 / out_rate as f64;
        if step <= 0.0 {
            break;
        }
        let (gl, gr) = if src_ch == 1 {
            let (l, r) = spatial_gains(voice, listener, right);
            (l * master, r * master)
        } else {
            // Stereo content bypasses spatialization.
            (voice.gain * master, voice.gain * master)
        };
        while f < frames {
            if voice.frame_pos >= src_frames as f64 {
                advance_entry(voice, src_frames as f64);
                break;
            }
            let i0 = voice.frame_pos as usize;
            let i1 = (i0 + 1).min(src_frames - 1);
            let t = (voice.frame_pos - i0 as f64) as f32;
            let (l, r) = if src_ch == 1 {
                let a = samples[i0] as f32 / 32768.0;
                let b = samples[i1] as f32 / 32768.0;
                let s = a + (b - a) * t;
                (s * gl, s * gr)
            } else {
                let la = samples[i0 * src_ch] as f32 / 32768.0;
                let lb = samples[i1 * src_ch] as f32 / 32768.0;
                let ra = samples[i0 * src_ch + 1] as f32 / 32768.0;
                let rb = samples[i1 * src_ch + 1] as f32 / 32768.0;
                ((la + (lb - la) * t) * gl, (ra + (rb - ra) * t) * gr)
            };
            let base = f * out_channels;
            for c in 0..out_channels {
                mix[base + c] += if c % 2 == 0 { l } else { r };
            }
            voice.frame_pos += step;
            f += 1;
        }
    }
}

/// Moves a voice past the end of its current content block. Returns false
/// when the voice stopped: static non-looping end, or queue exhausted,
/// which streamed playback detects as an underrun.
fn advance_entry(voice: &mut MixVoice, src_frames: f64) -> bool {
    if voice.static_src.is_some() {
        if voice.looping && src_frames > 0.0 {
            voice.frame_pos -= src_frames;
            true
        } else {
            voice.state = PlaybackState::Stopped;
            voice.frame_pos = 0.0;
            false
        }
    } else {
        voice.frame_pos -= src_frames;
        if voice.frame_pos < 0.0 {
            voice.frame_pos = 0.0;
        }
        voice.entry_idx += 1;
        if voice.entry_idx >= voice.queue.len() {
            voice.state = PlaybackState::Stopped;
            voice.frame_pos = 0.0;
            false
        } else {
            true
        }
    }
}

impl CpalDevice {
    /// Opens the default output device and starts the mixer stream.
    pub fn new() -> Result<Self> {
        let mixer = Arc::new(Mutex::new(MixerState::new()));
        let fault = Arc::new(Mutex::new(None));
        let (commands, command_rx) = channel();
        let (ready_tx, ready_rx) = channel();
        let mixer_for_thread = mixer.clone();
        let fault_for_thread = fault.clone();
        let manager = thread::Builder::new()
            .name("audio-device".into())
            .spawn(move || {
                manager_thread(mixer_for_thread, fault_for_thread, command_rx, ready_tx);
            })
            .map_err(|e| Error::Device(format!("failed to spawn audio thread: {e}")))?;
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CpalDevice {
                mixer,
                fault,
                commands,
                manager: Some(manager),
            }),
            Ok(Err(msg)) => {
                let _ = manager.join();
                Err(Error::Device(msg))
            }
            Err(_) => {
                let _ = manager.join();
                Err(Error::Device(
                    "audio manager thread exited during startup".into(),
                ))
            }
        }
    }

    fn record_fault(&self, msg: String) {
        warn!("audio device: {msg}");
        *self.fault.lock().unwrap() = Some(msg);
    }
}

fn manager_thread(
    mixer: Arc<Mutex<MixerState>>,
    fault: Arc<Mutex<Option<String>>>,
    commands: Receiver<StreamCommand>,
    ready: Sender<std::result::Result<(), String>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        let _ = ready.send(Err("no audio output device available".into()));
        return;
    };
    let config = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready.send(Err(format!("no default output config: {e}")));
            return;
        }
    };
    let sample_format = config.sample_format();
    let stream_config: StreamConfig = config.into();
    let out_rate = stream_config.sample_rate.0;
    let out_channels = stream_config.channels as usize;

    let built = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer, fault.clone()),
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer, fault.clone()),
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer, fault.clone()),
        other => Err(format!("unsupported output sample format {other:?}")),
    };
    let stream = match built {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready.send(Err(format!("failed to start output stream: {e}")));
        return;
    }
    info!("audio output started: {out_rate} Hz, {out_channels} channels ({sample_format:?})");
    let _ = ready.send(Ok(()));

    while let Ok(cmd) = commands.recv() {
        match cmd {
            StreamCommand::Suspend => {
                if let Err(e) = stream.pause() {
                    warn!("failed to suspend output stream: {e}");
                    *fault.lock().unwrap() = Some(e.to_string());
                }
            }
            StreamCommand::Resume => {
                if let Err(e) = stream.play() {
                    warn!("failed to resume output stream: {e}");
                    *fault.lock().unwrap() = Some(e.to_string());
                }
            }
            StreamCommand::Shutdown => break,
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<MixerState>>,
    fault: Arc<Mutex<Option<String>>>,
) -> std::result::Result<cpal::Stream, String>
where
    T: SizedSample + FromSample<f32>,
{
    let out_rate = config.sample_rate.0;
    let out_channels = config.channels as usize;
    device
        .build_output_stream(
            config,
            move |out: &mut [T], _| {
                let mut st = mixer.lock().unwrap();
                st.render(out_rate, out_channels, out);
            },
            move |err| {
                warn!("audio stream error: {err}");
                *fault.lock().unwrap() = Some(err.to_string());
            },
            None,
        )
        .map_err(|e| format!("failed to build output stream: {e}"))
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        let _ = self.commands.send(StreamCommand::Shutdown);
        if let Some(handle) = self.manager.take() {
            if handle.join().is_err() {
                warn!("audio manager thread panicked during shutdown");
            }
        }
    }
}

impl Device for CpalDevice {
    fn create_buffer(&self) -> Result<BufferId> {
        let mut st = self.mixer.lock().unwrap();
        let id = st.next_id;
        st.next_id += 1;
        st.buffers.insert(
            id,
            MixBuffer {
                samples: Arc::new(Vec::new()),
                format: BufferFormat::Mono16,
                sample_rate: 0,
            },
        );
        Ok(BufferId(id))
    }

    fn destroy_buffer(&self, buffer: BufferId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
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
        let mut st = self.mixer.lock().unwrap();
        let b = st
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))?;
        b.samples = Arc::new(samples.to_vec());
        b.format = format;
        b.sample_rate = sample_rate;
        Ok(())
    }

    fn buffer_info(&self, buffer: BufferId) -> Result<BufferInfo> {
        let st = self.mixer.lock().unwrap();
        let b = st
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| Error::Device(format!("unknown buffer {}", buffer.0)))?;
        Ok(BufferInfo {
            sample_count: b.samples.len() as u64,
            bits_per_sample: b.format.bits_per_sample(),
            channel_count: b.format.channel_count(),
            sample_rate: b.sample_rate,
        })
    }

    fn create_voice(&self) -> Result<VoiceId> {
        let mut st = self.mixer.lock().unwrap();
        let id = st.next_id;
        st.next_id += 1;
        st.voices.insert(id, MixVoice::new());
        Ok(VoiceId(id))
    }

    fn destroy_voice(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        st.voices
            .remove(&voice.0)
            .map(|_| ())
            .ok_or_else(|| Error::Device(format!("unknown voice {}", voice.0)))
    }

    fn set_voice_buffer(&self, voice: VoiceId, buffer: Option<BufferId>) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let snap = match buffer {
            Some(b) => Some(st.snapshot(b)?),
            None => None,
        };
        let v = st.voice_mut(voice.0)?;
        v.static_src = snap;
        v.queue.clear();
        v.entry_idx = 0;
        v.frame_pos = 0.0;
        v.state = PlaybackState::Stopped;
        Ok(())
    }

    fn queue_buffer(&self, voice: VoiceId, buffer: BufferId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let snap = st.snapshot(buffer)?;
        let v = st.voice_mut(voice.0)?;
        if v.static_src.is_some() {
            return Err(Error::Device(format!(
                "voice {} has a static buffer; queueing is invalid",
                voice.0
            )));
        }
        v.queue.push_back(snap);
        Ok(())
    }

    fn unqueue_buffer(&self, voice: VoiceId) -> Result<Option<BufferId>> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        if v.entry_idx > 0 {
            let entry = v.queue.pop_front();
            v.entry_idx -= 1;
            Ok(entry.map(|e| BufferId(e.buffer)))
        } else {
            Ok(None)
        }
    }

    fn processed_buffer_count(&self, voice: VoiceId) -> Result<usize> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        Ok(v.entry_idx.min(v.queue.len()))
    }

    fn clear_queue(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        v.queue.clear();
        v.entry_idx = 0;
        v.frame_pos = 0.0;
        Ok(())
    }

    fn play_voice(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        match v.state {
            PlaybackState::Paused => v.state = PlaybackState::Playing,
            PlaybackState::Stopped | PlaybackState::Playing => {
                v.entry_idx = 0;
                v.frame_pos = 0.0;
                v.state = PlaybackState::Playing;
            }
        }
        Ok(())
    }

    fn pause_voice(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        if v.state == PlaybackState::Playing {
            v.state = PlaybackState::Paused;
        }
        Ok(())
    }

    fn stop_voice(&self, voice: VoiceId) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        v.state = PlaybackState::Stopped;
        v.entry_idx = v.queue.len();
        v.frame_pos = 0.0;
        Ok(())
    }

    fn voice_state(&self, voice: VoiceId) -> PlaybackState {
        let st = self.mixer.lock().unwrap();
        st.voices
            .get(&voice.0)
            .map(|v| v.state)
            .unwrap_or(PlaybackState::Stopped)
    }

    fn voice_sample_offset(&self, voice: VoiceId) -> u64 {
        let st = self.mixer.lock().unwrap();
        st.voices
            .get(&voice.0)
            .map(|v| v.sample_offset())
            .unwrap_or(0)
    }

    fn set_voice_sample_offset(&self, voice: VoiceId, offset: u64) -> Result<()> {
        let mut st = self.mixer.lock().unwrap();
        let v = st.voice_mut(voice.0)?;
        if let Some(s) = &v.static_src {
            let frames = (s.samples.len() / s.channels.max(1)) as u64;
            v.frame_pos = ((offset / s.channels.max(1) as u64).min(frames)) as f64;
        } else {
            let mut remaining = offset;
            v.entry_idx = 0;
            v.frame_pos = 0.0;
            for entry in &v.queue {
                let len = entry.samples.len() as u64;
                if remaining >= len {
                    remaining -= len;
                    v.entry_idx += 1;
                } else {
                    v.frame_pos = (remaining / entry.channels.max(1) as u64) as f64;
                    break;
                }
            }
        }
        Ok(())
    }

    fn set_voice_gain(&self, voice: VoiceId, gain: f32) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.gain = gain.max(0.0);
        Ok(())
    }

    fn set_voice_pitch(&self, voice: VoiceId, pitch: f32) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.pitch = pitch.max(0.0);
        Ok(())
    }

    fn set_voice_position(&self, voice: VoiceId, position: [f32; 3]) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.position = position;
        Ok(())
    }

    fn set_voice_velocity(&self, voice: VoiceId, velocity: [f32; 3]) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.velocity = velocity;
        Ok(())
    }

    fn set_voice_direction(&self, voice: VoiceId, direction: [f32; 3]) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.direction = direction;
        Ok(())
    }

    fn set_voice_relative(&self, voice: VoiceId, relative: bool) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.relative = relative;
        Ok(())
    }

    fn set_voice_reference_distance(&self, voice: VoiceId, distance: f32) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.reference_distance = distance.max(0.0);
        Ok(())
    }

    fn set_voice_rolloff(&self, voice: VoiceId, rolloff: f32) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.rolloff = rolloff.max(0.0);
        Ok(())
    }

    fn set_voice_looping(&self, voice: VoiceId, looping: bool) -> Result<()> {
        self.mixer.lock().unwrap().voice_mut(voice.0)?.looping = looping;
        Ok(())
    }

    fn set_listener_position(&self, position: [f32; 3]) {
        self.mixer.lock().unwrap().listener.position = position;
    }

    fn set_listener_velocity(&self, velocity: [f32; 3]) {
        self.mixer.lock().unwrap().listener.velocity = velocity;
    }

    fn set_listener_orientation(&self, at: [f32; 3], up: [f32; 3]) {
        let mut st = self.mixer.lock().unwrap();
        st.listener.at = at;
        st.listener.up = up;
    }

    fn set_master_gain(&self, gain: f32) {
        self.mixer.lock().unwrap().listener.gain = gain.max(0.0);
    }

    fn suspend(&self) {
        if self.commands.send(StreamCommand::Suspend).is_err() {
            self.record_fault("audio manager thread is gone".into());
        }
    }

    fn resume(&self) {
        if self.commands.send(StreamCommand::Resume).is_err() {
            self.record_fault("audio manager thread is gone".into());
        }
    }

    fn take_error(&self) -> Option<String> {
        self.fault.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_listener() -> ListenerState {
        ListenerState {
            position: [0.0; 3],
            velocity: [0.0; 3],
            at: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            gain: 1.0,
        }
    }

    #[test]
    fn test_listener_right_axis() {
        let r = listener_right([0.0, 0.0, -1.0], [0.0, 1.0, 0.0]);
        assert!((r[0] - 1.0).abs() < 1e-6);
        assert!(r[1].abs() < 1e-6);
        assert!(r[2].abs() < 1e-6);
    }

    #[test]
    fn test_spatial_gains_centered() {
        let voice = MixVoice::new();
        let (l, r) = spatial_gains(&voice, &test_listener(), [1.0, 0.0, 0.0]);
        assert!((l - r).abs() < 1e-6);
    }

    #[test]
    fn test_spatial_gains_pan_right() {
        let mut voice = MixVoice::new();
        voice.position = [5.0, 0.0, 0.0];
        let (l, r) = spatial_gains(&voice, &test_listener(), [1.0, 0.0, 0.0]);
        assert!(r > l);
    }

    #[test]
    fn test_spatial_gains_attenuate_with_distance() {
        let mut near = MixVoice::new();
        near.position = [0.0, 0.0, -2.0];
        let mut far = MixVoice::new();
        far.position = [0.0, 0.0, -20.0];
        let listener = test_listener();
        let (nl, nr) = spatial_gains(&near, &listener, [1.0, 0.0, 0.0]);
        let (fl, fr) = spatial_gains(&far, &listener, [1.0, 0.0, 0.0]);
        assert!(nl + nr > fl + fr);
    }

    #[test]
    fn test_mix_voice_consumes_queue() {
        let mut voice = MixVoice::new();
        voice.queue.push_back(Snapshot {
            buffer: 1,
            samples: Arc::new(vec![1000i16; 100]),
            channels: 1,
            rate: 48000,
        });
        voice.state = PlaybackState::Playing;
        let listener = test_listener();
        let mut mix = vec![0.0f32; 400 * 2];
        mix_voice(
            &mut voice,
            &listener,
            [1.0, 0.0, 0.0],
            48000,
            2,
            400,
            &mut mix,
        );
        // 100 source frames < 400 output frames: queue exhausts, voice stops.
        assert_eq!(voice.state, PlaybackState::Stopped);
        assert_eq!(voice.entry_idx, 1);
        assert!(mix[0] != 0.0);
    }

    #[test]
    fn test_mix_voice_static_loops() {
        let mut voice = MixVoice::new();
        voice.static_src = Some(Snapshot {
            buffer: 1,
            samples: Arc::new(vec![500i16; 50]),
            channels: 1,
            rate: 48000,
        });
        voice.looping = true;
        voice.state = PlaybackState::Playing;
        let listener = test_listener();
        let mut mix = vec![0.0f32; 300 * 2];
        mix_voice(
            &mut voice,
            &listener,
            [1.0, 0.0, 0.0],
            48000,
            2,
            300,
            &mut mix,
        );
        assert_eq!(voice.state, PlaybackState::Playing);
        assert!(voice.frame_pos < 50.0);
    }
}
