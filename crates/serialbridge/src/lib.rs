//! Clock-aligned snapshot delivery to a serial microcontroller.
//!
//! serialbridge collects a small comma-separated snapshot on a fixed wall-clock
//! cadence, frames it, hands it to the peer and waits for the acknowledgement.
//!
//! # Crate Structure
//!
//! - [`transport`]: Serial channel abstraction (hardware ports, in-memory peers)
//! - [`frame`]: `<`/`>` delimited framing
//! - [`session`]: Ready handshake and request/reply sessions
//! - [`scheduler`]: Clock-aligned delivery loop
//! - [`producer`] / [`snapshot`]: Payload sources and snapshot formatting

pub mod error;
pub mod producer;
pub mod scheduler;
pub mod snapshot;

pub use error::{BridgeError, ProducerError, Result};
pub use producer::{
    from_fn, CommandProducer, FixedProducer, FnProducer, PageTextProducer, Producer,
};
pub use scheduler::{
    next_wake, Clock, ExchangeRecord, LoopSummary, ScheduleConfig, Scheduler, SystemClock,
    DEFAULT_INTERVAL_SECS, DEFAULT_OFFSET_SECS, TIMESTAMP_FORMAT,
};
pub use snapshot::{fallback_payload, PageText, Snapshot, SnapshotParser};

/// Re-export transport types.
pub mod transport {
    pub use serialbridge_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialbridge_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use serialbridge_session::*;
}
