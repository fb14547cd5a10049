use std::time::Instant;

use bytes::BytesMut;
use serialbridge_transport::{CancelToken, SerialChannel};
use tracing::debug;

use crate::codec::{decode_frame, encode_frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Sends and receives complete frames over a [`SerialChannel`].
///
/// Owns the channel for its whole lifetime. Callers always get complete
/// payloads; partial reads and resynchronization are handled here.
pub struct FramedChannel<C> {
    inner: C,
    buf: BytesMut,
    config: FrameConfig,
}

impl<C: SerialChannel> FramedChannel<C> {
    /// Create a framed channel with default markers.
    pub fn new(inner: C) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a framed channel with explicit configuration.
    pub fn with_config(inner: C, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(64),
            config,
        }
    }

    /// Encode and write one frame (blocking).
    pub fn send(&mut self, payload: &str) -> Result<()> {
        self.buf.clear();
        encode_frame(payload, &self.config, &mut self.buf);
        self.inner.write_all(&self.buf)?;
        Ok(())
    }

    /// Read the next complete frame, waiting as long as it takes.
    ///
    /// Returns `Err(FrameError::Cancelled)` once `cancel` fires.
    pub fn recv(&mut self, cancel: &CancelToken) -> Result<String> {
        self.recv_until(cancel, None)
    }

    /// Read the next complete frame, giving up at `deadline`.
    pub fn recv_until(&mut self, cancel: &CancelToken, deadline: Option<Instant>) -> Result<String> {
        let inner = &mut self.inner;
        decode_frame(&self.config, || -> Result<u8> {
            loop {
                if cancel.is_cancelled() {
                    return Err(FrameError::Cancelled);
                }
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Err(FrameError::TimedOut);
                }
                if let Some(byte) = inner.try_read_byte()? {
                    return Ok(byte);
                }
            }
        })
    }

    /// Number of bytes buffered by the channel.
    pub fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.inner.bytes_available()?)
    }

    /// Drop everything currently buffered by the channel.
    ///
    /// Returns the number of bytes discarded.
    pub fn discard_pending(&mut self) -> Result<usize> {
        let mut dropped = 0usize;
        while self.inner.bytes_available()? > 0 {
            match self.inner.try_read_byte()? {
                Some(_) => dropped += 1,
                None => break,
            }
        }
        if dropped > 0 {
            debug!(bytes = dropped, "discarded stale input");
        }
        Ok(dropped)
    }

    /// Close the underlying channel.
    pub fn close(&mut self) -> Result<()> {
        Ok(self.inner.close()?)
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Borrow the underlying channel.
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Mutably borrow the underlying channel.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Consume the framed channel and return the inner channel.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Current frame configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<C> std::fmt::Debug for FramedChannel<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
