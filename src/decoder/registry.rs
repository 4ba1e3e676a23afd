//! Ordered decoder registry.
//!
//! First match wins, so more specific probes must be registered ahead of
//! more permissive ones. A process-wide default registry is seeded with
//! the built-in formats (WAV, then Ogg/Vorbis) on first use.

use std::io::{Seek, SeekFrom};
use std::sync::{Mutex, OnceLock};

use symphonia::core::io::MediaSource;
use tracing::debug;

use crate::error::{Error, Result};

use super::vorbis::VorbisFactory;
use super::wav::WavFactory;
use super::{Decoder, DecoderFactory};

pub struct DecoderRegistry {
    factories: Vec<Box<dyn DecoderFactory>>,
}

impl DecoderRegistry {
    /// Empty registry with no formats registered.
    pub fn new() -> Self {
        DecoderRegistry {
            factories: Vec::new(),
        }
    }

    /// Appends a factory unless one with the same name is already
    /// registered.
    pub fn register(&mut self, factory: Box<dyn DecoderFactory>) {
        if self.factories.iter().any(|f| f.name() == factory.name()) {
            return;
        }
        debug!("registered decoder: {}", factory.name());
        self.factories.push(factory);
    }

    /// Removes the factory with the given name, if present.
    pub fn unregister(&mut self, name: &str) {
        self.factories.retain(|f| f.name() != name);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Probes the registered factories in order and opens a decode
    /// session with the first that recognizes the stream. The stream is
    /// rewound to offset 0 before every probe and before the final open.
    pub fn create_reader_for(
        &self,
        mut stream: Box<dyn MediaSource>,
    ) -> Result<Box<dyn Decoder>> {
        for factory in &self.factories {
            stream.seek(SeekFrom::Start(0))?;
            if factory.check(stream.as_mut()) {
                debug!("decoder {} accepted the stream", factory.name());
                stream.seek(SeekFrom::Start(0))?;
                return factory.open(stream);
            }
        }
        Err(Error::Open(
            "no registered decoder recognizes this audio format".into(),
        ))
    }
}

impl Default for DecoderRegistry {
    /// Registry with the built-in formats: WAV first, then Ogg/Vorbis.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(WavFactory));
        registry.register(Box::new(VorbisFactory));
        registry
    }
}

static DEFAULT_REGISTRY: OnceLock<Mutex<DecoderRegistry>> = OnceLock::new();

fn default_registry() -> &'static Mutex<DecoderRegistry> {
    DEFAULT_REGISTRY.get_or_init(|| Mutex::new(DecoderRegistry::default()))
}

/// Adds a factory to the process-wide registry consulted by
/// `SoundFile`. Idempotent by factory name.
pub fn register_factory(factory: Box<dyn DecoderFactory>) {
    default_registry().lock().unwrap().register(factory);
}

/// Removes a factory from the process-wide registry. Idempotent.
pub fn unregister_factory(name: &str) {
    default_registry().lock().unwrap().unregister(name);
}

pub(crate) fn create_reader(stream: Box<dyn MediaSource>) -> Result<Box<dyn Decoder>> {
    default_registry().lock().unwrap().create_reader_for(stream)
}
