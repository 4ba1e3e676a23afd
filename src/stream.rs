//! Streamed playback.
//!
//! A `SoundStream` keeps its source open and decodes it on a background
//! thread while a small rotating set of device buffers is kept full and
//! queued on the voice. The thread claims the `SoundFile` from a shared
//! slot once it is running and returns it there when it exits, so the
//! decoder cursor has exactly one writer while streaming is active and
//! the source survives a thread that never started.
//!
//! End-of-data is decoder-driven: the fill that comes up short marks its
//! slot as the end marker. When the device reports that slot consumed,
//! the processed-sample counter resets, which is what makes a loop wrap
//! (and a natural end) report an offset near zero.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use symphonia::core::io::MediaSource;
use tracing::{debug, error, warn};

use crate::context::AudioContext;
use crate::device::{debug_check, BufferFormat, BufferId, Device, VoiceId};
use crate::error::{Error, Result};
use crate::file::SoundFile;
use crate::state::PlaybackState;
use crate::voice::Voice;

/// Rotating device buffers per stream.
pub const STREAM_BUFFER_COUNT: usize = 3;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cross-thread state shared with the worker. Never held across a
/// device call.
struct StreamCtrl {
    requested: PlaybackState,
    streaming: bool,
    /// Interleaved samples consumed and unqueued so far; the device
    /// offset covers only what is still queued.
    processed: u64,
    looping: bool,
}

pub struct SoundStream {
    voice: Voice,
    ctrl: Arc<Mutex<StreamCtrl>>,
    format: BufferFormat,
    channel_count: u16,
    sample_rate: u32,
    duration: Duration,
    chunk_samples: usize,
    /// Empty only while a running worker has claimed the source.
    file: Arc<Mutex<Option<SoundFile>>>,
    worker: Option<JoinHandle<()>>,
}

impl SoundStream {
    pub fn open_file(ctx: &AudioContext, path: impl AsRef<Path>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_file(path)?)
    }

    pub fn open_memory(ctx: &AudioContext, data: Vec<u8>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_memory(data)?)
    }

    pub fn open_stream(ctx: &AudioContext, stream: Box<dyn MediaSource>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_stream(stream)?)
    }

    fn from_sound_file(ctx: &AudioContext, file: SoundFile) -> Result<Self> {
        let channel_count = file.channel_count();
        let format = BufferFormat::from_channel_count(channel_count).ok_or_else(|| {
            Error::Format(format!("unsupported channel count {channel_count}"))
        })?;
        let sample_rate = file.sample_rate();
        if sample_rate == 0 {
            return Err(Error::Format("zero sample rate".into()));
        }
        // A quarter second of interleaved samples per buffer.
        let chunk_samples = (sample_rate as usize * channel_count as usize / 4).max(1);
        Ok(SoundStream {
            voice: Voice::new(ctx)?,
            ctrl: Arc::new(Mutex::new(StreamCtrl {
                requested: PlaybackState::Stopped,
                streaming: false,
                processed: 0,
                looping: false,
            })),
            format,
            channel_count,
            sample_rate,
            duration: file.duration(),
            chunk_samples,
            file: Arc::new(Mutex::new(Some(file))),
            worker: None,
        })
    }

    /// Starts playback from the beginning, resuming instead when paused
    /// and restarting when already playing.
    pub fn play(&mut self) {
        if self.status() == PlaybackState::Paused {
            {
                self.ctrl.lock().unwrap().requested = PlaybackState::Playing;
            }
            if let Err(e) = self.voice.device().play_voice(self.voice.id()) {
                warn!("stream resume failed: {e}");
            }
            debug_check(&**self.voice.device(), "stream resume");
            return;
        }
        // Full restart: join any previous worker and rewind.
        self.stop();
        self.launch(PlaybackState::Playing);
    }

    pub fn pause(&mut self) {
        {
            let mut ctrl = self.ctrl.lock().unwrap();
            if !ctrl.streaming {
                return;
            }
            ctrl.requested = PlaybackState::Paused;
        }
        if let Err(e) = self.voice.device().pause_voice(self.voice.id()) {
            warn!("stream pause failed: {e}");
        }
        debug_check(&**self.voice.device(), "stream pause");
    }

    /// Stops playback, joins the worker, and rewinds the source. There
    /// is no join timeout; a device call that blocks indefinitely would
    /// block this too.
    pub fn stop(&mut self) {
        {
            let mut ctrl = self.ctrl.lock().unwrap();
            ctrl.requested = PlaybackState::Stopped;
            ctrl.streaming = false;
        }
        self.join_worker();
        if let Err(e) = self.voice.device().stop_voice(self.voice.id()) {
            warn!("stream stop failed: {e}");
        }
        if let Some(file) = self.file.lock().unwrap().as_mut() {
            if let Err(e) = file.seek_sample(0) {
                warn!("stream rewind failed: {e}");
            }
        }
        self.ctrl.lock().unwrap().processed = 0;
    }

    /// Device state, masked with the requested state while the worker is
    /// spinning up so a play that has not reached the device yet still
    /// reads as Playing.
    pub fn status(&self) -> PlaybackState {
        let state = self.voice.device().voice_state(self.voice.id());
        if state == PlaybackState::Stopped {
            let ctrl = self.ctrl.lock().unwrap();
            if ctrl.streaming {
                return ctrl.requested;
            }
        }
        state
    }

    /// Jumps to a time offset, preserving the playback state: a playing
    /// stream resumes there, a paused one stays paused.
    pub fn set_playing_offset(&mut self, offset: Duration) {
        let prior = self.status();
        self.stop();
        let frame = (offset.as_secs_f64() * self.sample_rate as f64) as u64;
        let target = frame * self.channel_count as u64;
        {
            let mut slot = self.file.lock().unwrap();
            let Some(file) = slot.as_mut() else {
                warn!("stream source unavailable; cannot seek");
                return;
            };
            if let Err(e) = file.seek_sample(target) {
                warn!("stream seek failed: {e}");
                return;
            }
        }
        self.ctrl.lock().unwrap().processed = target;
        match prior {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => self.launch(PlaybackState::Playing),
            PlaybackState::Paused => self.launch(PlaybackState::Paused),
        }
    }

    /// Unqueued-sample counter plus the device's intra-queue offset.
    pub fn playing_offset(&self) -> Duration {
        let processed = self.ctrl.lock().unwrap().processed;
        let queued = self.voice.device().voice_sample_offset(self.voice.id());
        let per_second = self.channel_count as u64 * self.sample_rate as u64;
        Duration::from_secs_f64((processed + queued) as f64 / per_second as f64)
    }

    /// Loop flag, observed by the worker each time the decoder runs dry.
    pub fn set_looping(&mut self, looping: bool) {
        self.ctrl.lock().unwrap().looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.ctrl.lock().unwrap().looping
    }

    /// Total duration, or zero when the container does not declare one.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn set_volume(&self, volume: f32) {
        self.voice.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.voice.volume()
    }

    pub fn set_pitch(&self, pitch: f32) {
        self.voice.set_pitch(pitch);
    }

    pub fn pitch(&self) -> f32 {
        self.voice.pitch()
    }

    pub fn set_position(&self, position: [f32; 3]) {
        self.voice.set_position(position);
    }

    pub fn position(&self) -> [f32; 3] {
        self.voice.position()
    }

    pub fn set_velocity(&self, velocity: [f32; 3]) {
        self.voice.set_velocity(velocity);
    }

    pub fn velocity(&self) -> [f32; 3] {
        self.voice.velocity()
    }

    pub fn set_direction(&self, direction: [f32; 3]) {
        self.voice.set_direction(direction);
    }

    pub fn direction(&self) -> [f32; 3] {
        self.voice.direction()
    }

    pub fn set_relative_to_listener(&self, relative: bool) {
        self.voice.set_relative_to_listener(relative);
    }

    pub fn is_relative_to_listener(&self) -> bool {
        self.voice.is_relative_to_listener()
    }

    pub fn set_min_distance(&self, distance: f32) {
        self.voice.set_min_distance(distance);
    }

    pub fn min_distance(&self) -> f32 {
        self.voice.min_distance()
    }

    pub fn set_attenuation(&self, attenuation: f32) {
        self.voice.set_attenuation(attenuation);
    }

    pub fn attenuation(&self) -> f32 {
        self.voice.attenuation()
    }

    fn launch(&mut self, start: PlaybackState) {
        if self.file.lock().unwrap().is_none() {
            warn!("stream source unavailable; cannot play");
            return;
        }
        {
            let mut ctrl = self.ctrl.lock().unwrap();
            ctrl.streaming = true;
            ctrl.requested = start;
        }
        let device = self.voice.device().clone();
        let voice = self.voice.id();
        let ctrl = self.ctrl.clone();
        let format = self.format;
        let sample_rate = self.sample_rate;
        let chunk_samples = self.chunk_samples;
        let slot = self.file.clone();
        let spawned = thread::Builder::new()
            .name("sound-stream".into())
            .spawn(move || {
                // The source leaves the slot only here, on the running
                // thread; a spawn that never ran leaves it in place.
                let Some(file) = slot.lock().unwrap().take() else {
                    error!("stream source missing at worker start");
                    return;
                };
                let worker = StreamWorker {
                    device,
                    voice,
                    ctrl,
                    format,
                    sample_rate,
                    chunk: vec![0i16; chunk_samples],
                    buffers: Vec::with_capacity(STREAM_BUFFER_COUNT),
                    end_flags: [false; STREAM_BUFFER_COUNT],
                    file,
                    pending_stop: false,
                };
                let file = worker.run();
                *slot.lock().unwrap() = Some(file);
            });
        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                error!("failed to spawn stream thread: {e}");
                let mut ctrl = self.ctrl.lock().unwrap();
                ctrl.streaming = false;
                ctrl.requested = PlaybackState::Stopped;
            }
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("stream worker thread panicked");
            }
        }
    }
}

impl Drop for SoundStream {
    fn drop(&mut self) {
        // Completes the stop sequence before the voice is released.
        self.stop();
    }
}

struct StreamWorker {
    device: Arc<dyn Device>,
    voice: VoiceId,
    ctrl: Arc<Mutex<StreamCtrl>>,
    format: BufferFormat,
    sample_rate: u32,
    chunk: Vec<i16>,
    buffers: Vec<BufferId>,
    end_flags: [bool; STREAM_BUFFER_COUNT],
    file: SoundFile,
    /// Set once the decoder runs dry with looping off (or fails); stops
    /// refills while the queue drains.
    pending_stop: bool,
}

impl StreamWorker {
    fn run(mut self) -> SoundFile {
        match self.startup() {
            Ok(()) => self.pump(),
            Err(e) => warn!("stream startup failed: {e}"),
        }
        self.shutdown();
        {
            let mut ctrl = self.ctrl.lock().unwrap();
            ctrl.streaming = false;
            ctrl.requested = PlaybackState::Stopped;
            ctrl.processed = 0;
        }
        self.file
    }

    /// Allocates the rotating buffers, primes and queues them, and
    /// starts the voice unless the stream was launched paused.
    fn startup(&mut self) -> Result<()> {
        for _ in 0..STREAM_BUFFER_COUNT {
            self.buffers.push(self.device.create_buffer()?);
        }
        for slot in 0..STREAM_BUFFER_COUNT {
            if self.pending_stop {
                break;
            }
            self.fill_and_queue(slot)?;
        }
        let requested = self.ctrl.lock().unwrap().requested;
        if requested == PlaybackState::Playing {
            self.device.play_voice(self.voice)?;
        }
        debug_check(&*self.device, "stream startup");
        Ok(())
    }

    fn pump(&mut self) {
        loop {
            if !self.ctrl.lock().unwrap().streaming {
                break;
            }
            if !self.drain_processed() {
                break;
            }
            if self.device.voice_state(self.voice) == PlaybackState::Stopped {
                if self.pending_stop {
                    // Queue fully drained: natural end of the stream.
                    break;
                }
                let requested = self.ctrl.lock().unwrap().requested;
                if requested == PlaybackState::Playing {
                    debug!("stream underrun; restarting playback");
                    if let Err(e) = self.device.play_voice(self.voice) {
                        warn!("stream restart failed: {e}");
                        break;
                    }
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Unqueues every buffer the device has consumed, accounts it, and
    /// refills its slot. Returns false when the stream must abort.
    fn drain_processed(&mut self) -> bool {
        let processed = match self.device.processed_buffer_count(self.voice) {
            Ok(n) => n,
            Err(e) => {
                warn!("stream queue query failed: {e}");
                return false;
            }
        };
        for _ in 0..processed {
            let unqueued = match self.device.unqueue_buffer(self.voice) {
                Ok(Some(b)) => b,
                Ok(None) => break,
                Err(e) => {
                    warn!("stream unqueue failed: {e}");
                    return false;
                }
            };
            let Some(slot) = self.buffers.iter().position(|b| *b == unqueued) else {
                warn!("device returned a buffer this stream does not own");
                continue;
            };
            if self.end_flags[slot] {
                // Loop-point bookkeeping: offsets restart at zero.
                self.end_flags[slot] = false;
                self.ctrl.lock().unwrap().processed = 0;
            } else {
                let info = match self.device.buffer_info(unqueued) {
                    Ok(i) => i,
                    Err(e) => {
                        warn!("stream buffer query failed: {e}");
                        return false;
                    }
                };
                if info.bits_per_sample == 0 || info.channel_count == 0 {
                    warn!("corrupt stream buffer metadata; aborting playback");
                    return false;
                }
                self.ctrl.lock().unwrap().processed += info.sample_count;
            }
            if self.pending_stop {
                continue;
            }
            if let Err(e) = self.fill_and_queue(slot) {
                warn!("stream refill failed: {e}");
                return false;
            }
        }
        debug_check(&*self.device, "stream refill");
        true
    }

    /// Fills one slot from the decoder and queues it. A short read marks
    /// the slot as the end marker; with looping on, the source rewinds
    /// (retrying once so sources shorter than one chunk still wrap),
    /// otherwise a stop becomes pending. Errors are device errors only;
    /// decode failures end the stream gracefully.
    fn fill_and_queue(&mut self, slot: usize) -> Result<()> {
        let mut total = match self.file.read(&mut self.chunk) {
            Ok(n) => n,
            Err(e) => {
                debug!("stream decode ended: {e}");
                self.pending_stop = true;
                return Ok(());
            }
        };
        if total < self.chunk.len() {
            self.end_flags[slot] = true;
            let looping = self.ctrl.lock().unwrap().looping;
            if !looping {
                self.pending_stop = true;
            } else if let Err(e) = self.file.seek_sample(0) {
                debug!("stream loop rewind failed: {e}");
                self.pending_stop = true;
            } else if total == 0 {
                match self.file.read(&mut self.chunk) {
                    Ok(n) => total = n,
                    Err(e) => {
                        debug!("stream decode ended: {e}");
                        self.pending_stop = true;
                    }
                }
                if total == 0 {
                    self.pending_stop = true;
                }
            }
        }
        if total == 0 {
            return Ok(());
        }
        self.device.buffer_data(
            self.buffers[slot],
            self.format,
            &self.chunk[..total],
            self.sample_rate,
        )?;
        self.device.queue_buffer(self.voice, self.buffers[slot])?;
        Ok(())
    }

    /// Releases everything the worker allocated. Runs after the stop
    /// sequence so no in-flight device operation still references the
    /// buffers.
    fn shutdown(&mut self) {
        if let Err(e) = self.device.stop_voice(self.voice) {
            warn!("stream voice stop failed: {e}");
        }
        if let Err(e) = self.device.clear_queue(self.voice) {
            warn!("stream queue clear failed: {e}");
        }
        for buffer in self.buffers.drain(..) {
            if let Err(e) = self.device.destroy_buffer(buffer) {
                warn!("stream buffer teardown failed: {e}");
            }
        }
        debug_check(&*self.device, "stream shutdown");
    }
}
