//! Shared decoded buffers.
//!
//! A `SoundBuffer` owns one device buffer holding a fully decoded PCM
//! block. Sounds bound to it are tracked weakly by id; `update` cycles
//! every dependent's binding around a content rewrite, and teardown
//! detaches them all before the device buffer is released.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use symphonia::core::io::MediaSource;
use tracing::warn;

use crate::context::AudioContext;
use crate::device::{debug_check, BufferFormat, BufferId, Device};
use crate::error::{Error, Result};
use crate::file::SoundFile;
use crate::sound::SoundCore;

pub struct SoundBuffer {
    pub(crate) shared: Arc<BufferInner>,
}

pub(crate) struct BufferInner {
    ctx: AudioContext,
    hw: BufferId,
    meta: Mutex<BufferMeta>,
    dependents: Mutex<HashMap<u64, Weak<SoundCore>>>,
}

struct BufferMeta {
    samples: Arc<[i16]>,
    channel_count: u16,
    sample_rate: u32,
    duration: Duration,
}

fn duration_of(sample_count: usize, channel_count: u16, sample_rate: u32) -> Duration {
    if channel_count == 0 || sample_rate == 0 {
        return Duration::ZERO;
    }
    let frames = sample_count / channel_count as usize;
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

impl BufferInner {
    pub(crate) fn hw(&self) -> BufferId {
        self.hw
    }

    pub(crate) fn device(&self) -> &Arc<dyn Device> {
        self.ctx.device()
    }

    pub(crate) fn attach(&self, id: u64, core: Weak<SoundCore>) {
        self.dependents.lock().unwrap().insert(id, core);
    }

    pub(crate) fn detach(&self, id: u64) {
        self.dependents.lock().unwrap().remove(&id);
    }

    pub(crate) fn playback_params(&self) -> (u16, u32) {
        let meta = self.meta.lock().unwrap();
        (meta.channel_count, meta.sample_rate)
    }

    pub(crate) fn duration(&self) -> Duration {
        self.meta.lock().unwrap().duration
    }

    /// Live dependents, pruning entries whose sound is gone.
    fn snapshot_dependents(&self) -> Vec<Arc<SoundCore>> {
        let mut map = self.dependents.lock().unwrap();
        map.retain(|_, weak| weak.strong_count() > 0);
        map.values().filter_map(Weak::upgrade).collect()
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        for core in self.snapshot_dependents() {
            core.orphan();
        }
        self.dependents.lock().unwrap().clear();
        if let Err(e) = self.ctx.device().destroy_buffer(self.hw) {
            warn!("buffer teardown failed: {e}");
        }
    }
}

impl SoundBuffer {
    pub fn load_file(ctx: &AudioContext, path: impl AsRef<Path>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_file(path)?)
    }

    pub fn load_memory(ctx: &AudioContext, data: Vec<u8>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_memory(data)?)
    }

    pub fn load_stream(ctx: &AudioContext, stream: Box<dyn MediaSource>) -> Result<Self> {
        Self::from_sound_file(ctx, SoundFile::open_stream(stream)?)
    }

    fn from_sound_file(ctx: &AudioContext, mut file: SoundFile) -> Result<Self> {
        let channel_count = file.channel_count();
        let sample_rate = file.sample_rate();
        let mut samples = Vec::with_capacity(file.sample_count() as usize);
        let mut chunk = vec![0i16; 32 * 1024];
        loop {
            let got = file.read(&mut chunk)?;
            if got == 0 {
                break;
            }
            samples.extend_from_slice(&chunk[..got]);
        }
        Self::load_samples(ctx, &samples, channel_count, sample_rate)
    }

    /// Builds a buffer directly from interleaved samples. Channel count
    /// must be 1 or 2 and the rate non-zero.
    pub fn load_samples(
        ctx: &AudioContext,
        samples: &[i16],
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<Self> {
        let format = BufferFormat::from_channel_count(channel_count).ok_or_else(|| {
            Error::Format(format!("unsupported channel count {channel_count}"))
        })?;
        if sample_rate == 0 {
            return Err(Error::Format("zero sample rate".into()));
        }
        let device = ctx.device();
        let hw = device.create_buffer()?;
        if let Err(e) = device.buffer_data(hw, format, samples, sample_rate) {
            let _ = device.destroy_buffer(hw);
            return Err(e);
        }
        debug_check(&**device, "buffer load");
        Ok(SoundBuffer {
            shared: Arc::new(BufferInner {
                ctx: ctx.clone(),
                hw,
                meta: Mutex::new(BufferMeta {
                    samples: samples.into(),
                    channel_count,
                    sample_rate,
                    duration: duration_of(samples.len(), channel_count, sample_rate),
                }),
                dependents: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Replaces the buffer's content in place. Every bound sound is
    /// stopped and unbound for the rewrite, then rebound; rebinding
    /// restores the binding, not playback.
    pub fn update(
        &self,
        samples: &[i16],
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<()> {
        let format = BufferFormat::from_channel_count(channel_count).ok_or_else(|| {
            Error::Format(format!("unsupported channel count {channel_count}"))
        })?;
        if sample_rate == 0 {
            return Err(Error::Format("zero sample rate".into()));
        }
        let dependents = self.shared.snapshot_dependents();
        for core in &dependents {
            core.suspend_binding();
        }
        let device = self.shared.device();
        let result = device.buffer_data(self.shared.hw, format, samples, sample_rate);
        if result.is_ok() {
            let mut meta = self.shared.meta.lock().unwrap();
            meta.samples = samples.into();
            meta.channel_count = channel_count;
            meta.sample_rate = sample_rate;
            meta.duration = duration_of(samples.len(), channel_count, sample_rate);
        }
        for core in &dependents {
            core.rebind(self.shared.hw);
        }
        debug_check(&**device, "buffer update");
        result
    }

    /// The decoded samples, shared without copying.
    pub fn samples(&self) -> Arc<[i16]> {
        self.shared.meta.lock().unwrap().samples.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.shared.meta.lock().unwrap().samples.len()
    }

    pub fn channel_count(&self) -> u16 {
        self.shared.meta.lock().unwrap().channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.meta.lock().unwrap().sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.shared.meta.lock().unwrap().duration
    }
}
