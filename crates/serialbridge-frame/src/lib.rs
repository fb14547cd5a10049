//! Marker-delimited text framing for serial peers.
//!
//! Every message on the wire is a UTF-8 payload bounded by two marker bytes:
//! - start marker `<` (0x3C)
//! - end marker `>` (0x3E)
//!
//! There is no length prefix, checksum or escaping. The decoder discards
//! noise before a start marker and restarts accumulation whenever a second
//! start marker shows up before the end marker.

pub mod codec;
pub mod error;
pub mod framed;

pub use codec::{decode_frame, encode_frame, FrameConfig, FrameDecoder, END_MARKER, START_MARKER};
pub use error::{FrameError, Result};
pub use framed::FramedChannel;
