use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serialbridge::frame::FramedChannel;
use serialbridge::session::{
    HandshakeConfig, Session, SessionConfig, SessionError, DEFAULT_READY_SENTINEL,
};
use serialbridge::transport::{CancelToken, PortConfig, SerialPortChannel, DEFAULT_BAUD_RATE};
use serialbridge::{DEFAULT_INTERVAL_SECS, DEFAULT_OFFSET_SECS};
use tracing::{info, warn};

use crate::exit::{session_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod ports;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deliver snapshots to the peer on a clock-aligned schedule.
    Run(RunArgs),
    /// Perform a single request/reply exchange.
    Send(SendArgs),
    /// List serial ports visible to the OS.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyACM0, COM6).
    #[arg(env = "SERIALBRIDGE_PORT")]
    pub port: String,
    /// Line speed.
    #[arg(long, env = "SERIALBRIDGE_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Substring that marks the peer as ready.
    #[arg(long, default_value = DEFAULT_READY_SENTINEL)]
    pub sentinel: String,
    /// Give up waiting for the ready signal after this long (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub handshake_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Seconds between exchanges.
    #[arg(long, env = "SERIALBRIDGE_INTERVAL", default_value_t = DEFAULT_INTERVAL_SECS)]
    pub interval: f64,
    /// Phase within each interval, in seconds.
    #[arg(
        long,
        env = "SERIALBRIDGE_OFFSET",
        default_value_t = DEFAULT_OFFSET_SECS,
        allow_negative_numbers = true
    )]
    pub offset: f64,
    /// Exit after N exchanges.
    #[arg(long)]
    pub count: Option<u64>,
    /// Drop unsolicited peer output before each request.
    #[arg(long)]
    pub discard_stale: bool,
    #[command(flatten)]
    pub producer: ProducerArgs,
    /// Argument passed to the producer command (repeatable).
    #[arg(long = "arg", value_name = "ARG", requires = "command", allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Agent whose staleness is read from the page text.
    #[arg(long, requires = "page_text")]
    pub agent: Option<String>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ProducerArgs {
    /// Send the same payload every interval.
    #[arg(long)]
    pub payload: Option<String>,
    /// Run this program each interval; its trimmed stdout is the payload.
    #[arg(long, value_name = "PROG")]
    pub command: Option<String>,
    /// Build the snapshot from a page-text dump refreshed by a scraper.
    #[arg(long, value_name = "FILE", requires = "agent")]
    pub page_text: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Payload to frame and send.
    pub payload: String,
    /// Skip waiting for the ready signal.
    #[arg(long)]
    pub no_handshake: bool,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn handshake_config(link: &LinkArgs) -> CliResult<HandshakeConfig> {
    let timeout = link
        .handshake_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;
    Ok(HandshakeConfig {
        sentinel: link.sentinel.clone(),
        timeout,
        ..HandshakeConfig::default()
    })
}

pub(crate) fn open_session(
    link: &LinkArgs,
    config: SessionConfig,
) -> CliResult<Session<SerialPortChannel>> {
    let port_config = PortConfig::new(link.port.clone()).with_baud_rate(link.baud);
    let channel = SerialPortChannel::open(&port_config)
        .map_err(|err| transport_error("open failed", err))?;
    Ok(Session::new(FramedChannel::new(channel), config))
}

/// Handshake, closing the session if it does not complete.
///
/// Returns `Ok(false)` when interrupted before the peer became ready.
pub(crate) fn handshake(
    session: &mut Session<SerialPortChannel>,
    config: &HandshakeConfig,
    cancel: &CancelToken,
) -> CliResult<bool> {
    match session.handshake(config, cancel) {
        Ok(_) => Ok(true),
        Err(SessionError::Cancelled) => {
            info!("interrupted before the peer was ready");
            close_quietly(session);
            Ok(false)
        }
        Err(err) => {
            close_quietly(session);
            Err(session_error("handshake failed", err))
        }
    }
}

pub(crate) fn close_quietly(session: &mut Session<SerialPortChannel>) {
    if let Err(err) = session.close() {
        warn!(error = %err, "failed to close serial port");
    }
}

pub(crate) fn install_ctrlc_handler(cancel: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("failed to install Ctrl+C handler: {err}"))
    })
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
