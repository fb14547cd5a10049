use crate::error::Result;

/// A half-duplex byte channel to exactly one peer.
///
/// Not safe for concurrent use: the bridge drives it from a single execution
/// context, so implementations need no internal locking.
pub trait SerialChannel {
    /// Write all bytes and flush (blocking).
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait at most one poll window for a single byte.
    ///
    /// Returns `Ok(None)` when nothing arrived in the window so callers can
    /// observe cancellation between attempts.
    fn try_read_byte(&mut self) -> Result<Option<u8>>;

    /// Number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Release the underlying connection. Further I/O fails with `Closed`.
    fn close(&mut self) -> Result<()>;

    /// Whether `close()` has not been called yet.
    fn is_open(&self) -> bool;

    /// Block until one byte is available.
    fn read_byte(&mut self) -> Result<u8> {
        loop {
            if let Some(byte) = self.try_read_byte()? {
                return Ok(byte);
            }
        }
    }
}

impl<C: SerialChannel + ?Sized> SerialChannel for Box<C> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn try_read_byte(&mut self) -> Result<Option<u8>> {
        (**self).try_read_byte()
    }

    fn bytes_available(&mut self) -> Result<usize> {
        (**self).bytes_available()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}
