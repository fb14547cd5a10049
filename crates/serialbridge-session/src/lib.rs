//! Session layer for framed serial peers.
//!
//! Waits for the peer to announce it is ready, then drives strictly
//! alternating request/reply exchanges: one frame out, exactly one frame back.

pub mod error;
pub mod handshake;
pub mod session;
pub mod wait;

pub use error::{Result, SessionError};
pub use handshake::{
    wait_for_ready, Handshake, HandshakeConfig, HandshakeResult, HandshakeState,
    DEFAULT_READY_SENTINEL,
};
pub use session::{Session, SessionConfig};
pub use wait::{wait_for_input, DEFAULT_POLL_INTERVAL};
