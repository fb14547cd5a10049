use std::time::{Duration, Instant};

use serialbridge_frame::FramedChannel;
use serialbridge_transport::{CancelToken, SerialChannel};

use crate::error::{Result, SessionError};

/// Idle sleep between "bytes available" probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Block until the channel has at least one byte buffered.
///
/// Polls `bytes_available()` with a short idle sleep. Returns
/// `Cancelled` once `cancel` fires and `Ok(false)` when `deadline` passes.
pub fn wait_for_input<C: SerialChannel>(
    framed: &mut FramedChannel<C>,
    cancel: &CancelToken,
    poll_interval: Duration,
    deadline: Option<Instant>,
) -> Result<bool> {
    loop {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if framed.bytes_available()? > 0 {
            return Ok(true);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(false);
        }
        std::thread::sleep(poll_interval);
    }
}
