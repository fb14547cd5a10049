/// Errors that can occur on a serial channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named serial port.
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// The serial driver reported an error outside of plain I/O.
    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),

    /// An I/O error occurred on the serial stream.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port configuration was rejected before opening.
    #[error("invalid port configuration: {0}")]
    InvalidConfig(String),

    /// The channel was used after `close()`.
    #[error("serial channel closed")]
    Closed,

    /// The peer went away (device unplugged, in-memory peer hung up).
    #[error("peer disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, TransportError>;
