//! Serial channel abstraction.
//!
//! Provides a single capability set over a half-duplex byte stream:
//! - blocking single-byte reads (with a bounded poll window)
//! - a non-blocking "bytes available" probe
//! - bulk writes
//! - close
//!
//! This is the lowest layer of serialbridge. Everything else builds on top of
//! the [`SerialChannel`] trait provided here.

pub mod cancel;
pub mod error;
pub mod memory;
pub mod port;
pub mod traits;

pub use cancel::CancelToken;
pub use error::{Result, TransportError};
pub use memory::{MemoryChannel, MemoryPeer};
pub use port::{list_ports, PortConfig, PortSummary, SerialPortChannel, DEFAULT_BAUD_RATE};
pub use traits::SerialChannel;
