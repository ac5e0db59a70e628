use std::io::{Read, Write};
use std::process::{Command, Stdio};

use serde_json::Value;
use stdwire_channel::{Mode, Requester};
use stdwire_envelope::{Request, Response};

use crate::cmd::CallArgs;
use crate::exit::{channel_error, io_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let request = build_request(&args)?;
    let (program, program_args) = args
        .program
        .split_first()
        .ok_or_else(|| CliError::new(USAGE, "missing worker program"))?;

    let mut child = Command::new(program)
        .args(program_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| io_error(&format!("failed to start {program}"), err))?;
    tracing::debug!(program = %program, pid = child.id(), "worker started");

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| CliError::new(INTERNAL, "worker stdin unavailable"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| CliError::new(INTERNAL, "worker stdout unavailable"))?;

    let config = args.wire.config(Mode::Bridge);
    let outcome = match Requester::with_config(stdout, stdin, &config) {
        Ok(mut requester) => exchange(&mut requester, &request, args.worker),
        Err(err) => Err(err),
    };

    // The requester owned the worker's stdin; it is closed by now, so a
    // well-behaved worker sees end-of-stream and exits.
    let status = child
        .wait()
        .map_err(|err| io_error("failed waiting for worker", err))?;
    tracing::debug!(%status, "worker exited");

    let response = outcome.map_err(|err| channel_error("call failed", err))?;
    print_response(&response, format);

    if response.is_error() {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn exchange<R: Read, W: Write>(
    requester: &mut Requester<R, W>,
    request: &Request,
    worker: bool,
) -> stdwire_channel::Result<Response> {
    if worker {
        requester.await_alive()?;
    }
    requester.call(request)
}

fn build_request(args: &CallArgs) -> CliResult<Request> {
    let mut request = Request::new(args.id.clone());
    for (key, value) in &args.query {
        request = request.with_query(key.clone(), value.clone());
    }
    if let Some(text) = &args.text {
        request = request.with_text(text.clone());
    }
    if let Some(json) = &args.json {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        request = request
            .with_json(&value)
            .map_err(|err| CliError::new(USAGE, format!("--json: {err}")))?;
    }
    Ok(request)
}
