//! Error types for soundfield

use thiserror::Error;

/// Crate-wide error type.
///
/// Open and format failures are returned to the caller; device-layer
/// errors discovered asynchronously are polled and logged instead (the
/// backend reports them out of band, not per call). Mid-stream corruption
/// in a streaming worker never surfaces here: the worker stops that one
/// stream and logs a warning.
#[derive(Error, Debug)]
pub enum Error {
    /// Source cannot be opened, or no registered decoder matches it.
    #[error("Failed to open audio source: {0}")]
    Open(String),

    /// Malformed container or unsupported codec parameters.
    #[error("Unsupported audio format: {0}")]
    Format(String),

    /// Decoder session failure while opening or reading metadata.
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Synchronous device-layer failure (unknown handle, backend setup).
    #[error("Audio device error: {0}")]
    Device(String),

    /// I/O error from the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
