use std::time::{Duration, Instant};

use serialbridge_frame::{FrameError, FramedChannel};
use serialbridge_transport::{CancelToken, SerialChannel};
use tracing::{debug, info};

use crate::error::{Result, SessionError};
use crate::wait::{wait_for_input, DEFAULT_POLL_INTERVAL};

/// Substring the peer firmware sends once it has finished resetting.
pub const DEFAULT_READY_SENTINEL: &str = "Arduino is ready";

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Waiting,
    Ready,
}

/// Ready-sentinel recognizer.
///
/// Starts in `Waiting` and moves to `Ready` on the first payload containing the
/// sentinel as a substring. `Ready` is terminal.
#[derive(Debug, Clone)]
pub struct Handshake {
    sentinel: String,
    state: HandshakeState,
    observed: usize,
}

impl Handshake {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
            state: HandshakeState::Waiting,
            observed: 0,
        }
    }

    /// Feed one decoded payload and return the resulting state.
    pub fn observe(&mut self, payload: &str) -> HandshakeState {
        self.observed += 1;
        if self.state == HandshakeState::Waiting && payload.contains(&self.sentinel) {
            self.state = HandshakeState::Ready;
        }
        self.state
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Payloads fed so far, ready or not.
    pub fn frames_observed(&self) -> usize {
        self.observed
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new(DEFAULT_READY_SENTINEL)
    }
}

/// Configuration for the ready handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// Substring that marks the peer as ready.
    pub sentinel: String,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Idle sleep between "bytes available" probes.
    pub poll_interval: Duration,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_READY_SENTINEL.to_string(),
            timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResult {
    /// The payload that carried the sentinel.
    pub ready_payload: String,
    /// Payloads decoded while waiting, including the ready one.
    pub frames_observed: usize,
    pub elapsed: Duration,
}

/// Block until the peer sends a payload containing the ready sentinel.
///
/// Every decoded payload is logged, ready or not. Leftover bytes from before
/// the peer reset are consumed and dropped along the way.
pub fn wait_for_ready<C: SerialChannel>(
    framed: &mut FramedChannel<C>,
    config: &HandshakeConfig,
    cancel: &CancelToken,
) -> Result<HandshakeResult> {
    let started = Instant::now();
    let deadline = config.timeout.map(|timeout| started + timeout);
    let timed_out = || SessionError::HandshakeTimeout(config.timeout.unwrap_or_default());
    let mut handshake = Handshake::new(config.sentinel.clone());

    debug!(sentinel = %config.sentinel, "waiting for peer ready signal");

    loop {
        if !wait_for_input(framed, cancel, config.poll_interval, deadline)? {
            return Err(timed_out());
        }

        let payload = match framed.recv_until(cancel, deadline) {
            Ok(payload) => payload,
            Err(FrameError::TimedOut) => return Err(timed_out()),
            Err(err) => return Err(err.into()),
        };

        info!(payload = %payload, "peer message");

        if handshake.observe(&payload) == HandshakeState::Ready {
            let elapsed = started.elapsed();
            info!(
                frames = handshake.frames_observed(),
                elapsed_ms = elapsed.as_millis() as u64,
                "peer is ready"
            );
            return Ok(HandshakeResult {
                ready_payload: payload,
                frames_observed: handshake.frames_observed(),
                elapsed,
            });
        }
    }
}
