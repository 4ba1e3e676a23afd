//! Playback state shared by the device layer and the public API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport state of a playback instance or device voice.
///
/// For streamed instances the reported state is the reconciliation of the
/// device-reported voice state and the caller's requested state, masking
/// the latency between issuing play and the device actually starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Not playing; offset rewound to zero.
    Stopped,
    /// Halted mid-source; offset retained.
    Paused,
    /// Actively producing audio.
    Playing,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Playing => write!(f, "playing"),
        }
    }
}
