use std::path::PathBuf;
use std::process::ExitStatus;

use serialbridge_session::SessionError;

/// Errors that stop the delivery loop.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Session-level error (link failure, handshake failure).
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Interval/offset rejected before the loop starts.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by payload producers.
///
/// The scheduler never propagates these; it substitutes the fallback snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The producer command could not be started.
    #[error("failed to run producer command {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The producer command ran but reported failure.
    #[error("producer command {program} exited with {status}")]
    Exit { program: String, status: ExitStatus },

    /// The producer produced nothing usable.
    #[error("producer returned an empty payload")]
    Empty,

    /// The page-text dump could not be read.
    #[error("failed to read page text {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Any other producer-specific failure.
    #[error("{0}")]
    Other(String),
}
