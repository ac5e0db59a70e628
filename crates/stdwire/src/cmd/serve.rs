use std::io;

use stdwire_channel::{Channel, Handler, HandlerResult, Mode, StopHandle};
use stdwire_envelope::{ErrorInfo, Request, Response};

use crate::cmd::{HandlerKind, ServeArgs};
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, INTERRUPTED, SUCCESS};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let mode = if args.worker { Mode::Worker } else { Mode::Bridge };
    let config = args.wire.config(mode);

    let mut channel = Channel::with_config(io::stdin().lock(), Some(io::stdout().lock()), config)
        .map_err(|err| channel_error("invalid channel configuration", err))?;
    install_ctrlc_handler(channel.stop_handle())?;

    let summary = match args.handler {
        HandlerKind::Operation => channel.listen(OperationHandler),
        HandlerKind::Echo => channel.listen(EchoHandler),
        HandlerKind::Nothing => channel.listen_without_handler(),
    }
    .map_err(|err| channel_error("channel failed", err))?;

    tracing::info!(
        frames = summary.frames,
        parse_failures = summary.parse_failures,
        serialize_failures = summary.serialize_failures,
        handler_failures = summary.handler_failures,
        "serve finished"
    );
    Ok(SUCCESS)
}

/// Answers with the text of query parameter `operation`.
struct OperationHandler;

impl Handler for OperationHandler {
    fn handle(&mut self, request: &Request, response: &mut Response) -> HandlerResult {
        let operation = request.query_string("operation").ok_or_else(|| {
            ErrorInfo::new("missing query parameter \"operation\"").with_kind("bad_request")
        })?;
        response.text(operation);
        Ok(())
    }
}

/// Copies query parameters and content back to the caller.
struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&mut self, request: &Request, response: &mut Response) -> HandlerResult {
        if let Some(query) = request.queries() {
            for (key, value) in query {
                response.set_query(key.clone(), value.clone());
            }
        }
        if let Some(text) = request.text() {
            response.text(text);
        }
        Ok(())
    }
}

// A blocked stdin read cannot observe the stop flag, so a second Ctrl-C
// exits immediately.
fn install_ctrlc_handler(stop: StopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if stop.stop() {
            tracing::info!("stop requested, finishing buffered frames (Ctrl-C again to exit)");
        } else {
            std::process::exit(INTERRUPTED);
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
