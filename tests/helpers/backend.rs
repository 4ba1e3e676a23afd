//! Null-backend context construction for hardware-free tests.

use std::sync::Arc;

use soundfield::device::NullDevice;
use soundfield::AudioContext;

/// Build an `AudioContext` on a fresh `NullDevice`, returning the device
/// handle alongside it so tests can reach the inspection hooks
/// (`buffer_count`, `voice_count`, `corrupt_buffer_metadata`, ...).
///
/// The device assigns ids sequentially from 1, shared between buffers
/// and voices, so tests that need to name a specific resource can
/// predict its id from the construction order.
pub fn null_context() -> (AudioContext, Arc<NullDevice>) {
    let device = Arc::new(NullDevice::new());
    let ctx = AudioContext::with_device(device.clone());
    (ctx, device)
}
