use std::fmt;
use std::io;

use serialbridge::BridgeError;
use serialbridge_frame::FrameError;
use serialbridge_session::SessionError;
use serialbridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Open { ref source, .. }
            if source.kind() == serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        TransportError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::TimedOut => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::Cancelled => CliError::new(SUCCESS, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::HandshakeTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::Cancelled => CliError::new(SUCCESS, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn bridge_error(context: &str, err: BridgeError) -> CliError {
    match err {
        BridgeError::Session(err) => session_error(context, err),
        BridgeError::InvalidSchedule(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failure_maps_to_transport_code() {
        let err = SessionError::Transport(TransportError::Disconnected);
        assert_eq!(session_error("link", err).code, FAILURE);

        let err = TransportError::InvalidConfig("baud".to_string());
        assert_eq!(transport_error("open", err).code, USAGE);
    }

    #[test]
    fn permission_denied_on_open_is_distinct() {
        let err = TransportError::Open {
            port: "/dev/ttyACM0".to_string(),
            source: serialport::Error::new(
                serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
                "Permission denied",
            ),
        };
        assert_eq!(transport_error("open failed", err).code, PERMISSION_DENIED);

        let err = TransportError::Open {
            port: "/dev/ttyACM9".to_string(),
            source: serialport::Error::new(serialport::ErrorKind::NoDevice, "missing"),
        };
        assert_eq!(transport_error("open failed", err).code, TRANSPORT_ERROR);
    }

    #[test]
    fn handshake_timeout_maps_to_timeout_code() {
        let err = SessionError::HandshakeTimeout(std::time::Duration::from_secs(1));
        let cli = session_error("handshake failed", err);
        assert_eq!(cli.code, TIMEOUT);
        assert!(cli.message.starts_with("handshake failed: "));
    }

    #[test]
    fn reply_timeout_maps_to_timeout_code() {
        let err = BridgeError::Session(SessionError::Frame(FrameError::TimedOut));
        assert_eq!(bridge_error("exchange failed", err).code, TIMEOUT);
    }

    #[test]
    fn invalid_schedule_is_usage_error() {
        let err = BridgeError::InvalidSchedule("interval".to_string());
        assert_eq!(bridge_error("schedule", err).code, USAGE);
    }
}
