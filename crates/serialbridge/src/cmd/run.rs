use serialbridge::session::SessionConfig;
use serialbridge::transport::CancelToken;
use serialbridge::{
    CommandProducer, FixedProducer, PageTextProducer, Producer, ScheduleConfig, Scheduler,
};
use tracing::info;

use crate::cmd::{handshake, handshake_config, install_ctrlc_handler, open_session, RunArgs};
use crate::exit::{bridge_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_exchange, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let schedule = ScheduleConfig {
        interval_secs: args.interval,
        offset_secs: args.offset,
        max_iterations: args.count,
    };
    let producer = build_producer(&args)?;
    // Validate the schedule before touching the port.
    let mut scheduler =
        Scheduler::new(producer, schedule).map_err(|err| bridge_error("invalid schedule", err))?;
    let handshake_config = handshake_config(&args.link)?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let session_config = SessionConfig {
        discard_stale_input: args.discard_stale,
        ..SessionConfig::default()
    };
    let mut session = open_session(&args.link, session_config)?;

    if !handshake(&mut session, &handshake_config, &cancel)? {
        return Ok(SUCCESS);
    }

    info!(
        interval = args.interval,
        offset = args.offset,
        "starting schedule"
    );
    let summary = scheduler
        .run(session, &cancel, |record| print_exchange(record, format))
        .map_err(|err| bridge_error("link failed", err))?;

    if summary.cancelled {
        info!("interrupted; serial port closed");
    }
    Ok(SUCCESS)
}

fn build_producer(args: &RunArgs) -> CliResult<Box<dyn Producer>> {
    let producer = &args.producer;
    if let Some(payload) = &producer.payload {
        return Ok(Box::new(FixedProducer::new(payload.clone())));
    }
    if let Some(program) = &producer.command {
        return Ok(Box::new(CommandProducer::new(
            program.clone(),
            args.args.clone(),
        )));
    }
    if let Some(path) = &producer.page_text {
        let agent = args
            .agent
            .as_deref()
            .ok_or_else(|| CliError::new(USAGE, "--page-text requires --agent"))?;
        let page = PageTextProducer::new(path, agent)
            .map_err(|err| CliError::new(USAGE, format!("invalid page-text producer: {err}")))?;
        return Ok(Box::new(page));
    }
    Err(CliError::new(
        USAGE,
        "one of --payload, --command or --page-text is required",
    ))
}
