use serialbridge_frame::FrameError;
use serialbridge_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The ready sentinel was not seen in time.
    #[error("handshake timed out after {0:?} without a ready signal")]
    HandshakeTimeout(std::time::Duration),

    /// A previous request never got its reply.
    #[error("a request is still awaiting its reply")]
    ReplyOutstanding,

    /// Cancellation was requested while waiting on the peer.
    #[error("cancelled while waiting for the peer")]
    Cancelled,
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Cancelled => SessionError::Cancelled,
            FrameError::Transport(err) => SessionError::Transport(err),
            other => SessionError::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
