//! In-memory serial channel.
//!
//! Stands in for the microcontroller in tests and dry runs. The channel half is
//! handed to the bridge; the [`MemoryPeer`] half stays with the caller to inject
//! peer bytes and inspect what the bridge wrote.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Result, TransportError};
use crate::traits::SerialChannel;

const DEFAULT_POLL_WINDOW: Duration = Duration::from_millis(1);

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    hung_up: bool,
    close_calls: usize,
}

/// Bridge-side half of an in-memory link.
pub struct MemoryChannel {
    shared: Arc<Mutex<MemoryState>>,
    responder: Option<Responder>,
    poll_window: Duration,
    open: bool,
}

/// Peer-side handle of an in-memory link.
#[derive(Clone)]
pub struct MemoryPeer {
    shared: Arc<Mutex<MemoryState>>,
}

impl MemoryChannel {
    /// Create a connected channel/peer pair.
    pub fn pair() -> (MemoryChannel, MemoryPeer) {
        let shared = Arc::new(Mutex::new(MemoryState::default()));
        let channel = MemoryChannel {
            shared: Arc::clone(&shared),
            responder: None,
            poll_window: DEFAULT_POLL_WINDOW,
            open: true,
        };
        (channel, MemoryPeer { shared })
    }

    /// Run `responder` on every write; its output is queued as peer bytes.
    ///
    /// Models firmware that answers each request it receives.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn with_poll_window(mut self, poll_window: Duration) -> Self {
        self.poll_window = poll_window;
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.shared)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }
}

impl SerialChannel for MemoryChannel {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if self.state().hung_up {
            return Err(TransportError::Disconnected);
        }

        let reply = self.responder.as_mut().map(|respond| respond(bytes));

        let mut state = self.state();
        state.outbound.extend_from_slice(bytes);
        if let Some(reply) = reply {
            state.inbound.extend(reply);
        }
        Ok(())
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        self.ensure_open()?;
        {
            let mut state = self.state();
            if let Some(byte) = state.inbound.pop_front() {
                return Ok(Some(byte));
            }
            if state.hung_up {
                return Err(TransportError::Disconnected);
            }
        }
        std::thread::sleep(self.poll_window);
        Ok(None)
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.ensure_open()?;
        let state = self.state();
        if state.inbound.is_empty() && state.hung_up {
            return Err(TransportError::Disconnected);
        }
        Ok(state.inbound.len())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        self.state().close_calls += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl std::fmt::Debug for MemoryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryChannel")
            .field("open", &self.open)
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

impl MemoryPeer {
    /// Queue bytes as if the peer had sent them.
    pub fn send(&self, bytes: &[u8]) {
        lock(&self.shared).inbound.extend(bytes.iter().copied());
    }

    /// Everything the bridge has written so far.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared).outbound.clone()
    }

    /// Drain and return everything the bridge has written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut lock(&self.shared).outbound)
    }

    /// Bytes queued for the bridge but not yet read.
    pub fn pending(&self) -> usize {
        lock(&self.shared).inbound.len()
    }

    /// Simulate the device going away. Reads fail once queued bytes run out.
    pub fn hang_up(&self) {
        lock(&self.shared).hung_up = true;
    }

    /// How many times the bridge called `close()` on its half.
    pub fn close_calls(&self) -> usize {
        lock(&self.shared).close_calls
    }
}

impl std::fmt::Debug for MemoryPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.shared);
        f.debug_struct("MemoryPeer")
            .field("pending", &state.inbound.len())
            .field("written", &state.outbound.len())
            .field("hung_up", &state.hung_up)
            .finish()
    }
}

// A panic while holding the lock leaves plain byte buffers behind; keep using them.
fn lock(shared: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
