use serialbridge_transport::TransportError;

/// Errors that can occur while exchanging frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying serial channel failed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),

    /// A deadline passed before a complete frame arrived.
    #[error("timed out waiting for a complete frame")]
    TimedOut,

    /// Cancellation was requested while waiting for a frame.
    #[error("frame read cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, FrameError>;
