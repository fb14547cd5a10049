use serialbridge::session::SessionConfig;
use serialbridge::transport::CancelToken;
use serialbridge::{Clock, ExchangeRecord, SystemClock};

use crate::cmd::{
    close_quietly, handshake, handshake_config, install_ctrlc_handler, open_session, SendArgs,
};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_exchange, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let handshake_config = handshake_config(&args.link)?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut session = open_session(&args.link, SessionConfig::default())?;

    if !args.no_handshake && !handshake(&mut session, &handshake_config, &cancel)? {
        return Ok(SUCCESS);
    }

    let timestamp = SystemClock.timestamp();
    let outcome = session.execute(&args.payload, &cancel);
    close_quietly(&mut session);

    let reply = match outcome {
        Ok(reply) => reply,
        Err(serialbridge::session::SessionError::Cancelled) => return Ok(SUCCESS),
        Err(err) => return Err(session_error("exchange failed", err)),
    };

    print_exchange(
        &ExchangeRecord {
            iteration: 1,
            timestamp,
            payload: args.payload,
            reply,
            fallback: false,
        },
        format,
    );
    Ok(SUCCESS)
}
