//! Path-keyed buffer cache.
//!
//! Keeps fully decoded buffers alive by path so repeated one-shot
//! playback skips the decode. Removal only drops the cache's handle;
//! buffer teardown follows once the last external reference goes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::buffer::SoundBuffer;
use crate::context::AudioContext;
use crate::error::Result;

pub struct SoundCache {
    ctx: AudioContext,
    buffers: Mutex<HashMap<PathBuf, Arc<SoundBuffer>>>,
}

impl SoundCache {
    pub fn new(ctx: &AudioContext) -> Self {
        SoundCache {
            ctx: ctx.clone(),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached buffer for `path`, loading it on a miss. The
    /// lock is held across the load so concurrent misses decode once.
    pub fn get(&self, path: impl AsRef<Path>) -> Result<Arc<SoundBuffer>> {
        let path = path.as_ref();
        let mut buffers = self.buffers.lock().unwrap();
        if let Some(buffer) = buffers.get(path) {
            return Ok(buffer.clone());
        }
        debug!("sound cache miss: {}", path.display());
        let buffer = Arc::new(SoundBuffer::load_file(&self.ctx, path)?);
        buffers.insert(path.to_path_buf(), buffer.clone());
        Ok(buffer)
    }

    pub fn preload(&self, path: impl AsRef<Path>) -> Result<()> {
        self.get(path).map(|_| ())
    }

    /// Drops the cache's handle for `path`; returns whether one existed.
    pub fn remove(&self, path: impl AsRef<Path>) -> bool {
        self.buffers.lock().unwrap().remove(path.as_ref()).is_some()
    }

    pub fn clear(&self) {
        self.buffers.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_file(dir: &Path, name: &str) -> PathBuf {
        let samples: Vec<i16> = (0..100).collect();
        let payload: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(b"WAVE");
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&8000u32.to_le_bytes());
        v.extend_from_slice(&16000u32.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.extend_from_slice(&16u16.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        v.extend_from_slice(&payload);
        let path = dir.join(name);
        std::fs::write(&path, v).unwrap();
        path
    }

    #[test]
    fn test_get_caches_and_shares() {
        let dir = tempfile::tempdir().unwrap();
        let path = wav_file(dir.path(), "a.wav");
        let cache = SoundCache::new(&AudioContext::null());

        let first = cache.get(&path).unwrap();
        let second = cache.get(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(first.sample_count(), 100);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let a = wav_file(dir.path(), "a.wav");
        let b = wav_file(dir.path(), "b.wav");
        let cache = SoundCache::new(&AudioContext::null());

        cache.preload(&a).unwrap();
        cache.preload(&b).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.remove(&a));
        assert!(!cache.remove(&a));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = SoundCache::new(&AudioContext::null());
        assert!(cache.get("/nonexistent/missing.wav").is_err());
        assert!(cache.is_empty());
    }
}
