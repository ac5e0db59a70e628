use clap::{Args, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;
use stdwire_channel::{ChannelConfig, Mode};
use stdwire_envelope::ContentKey;
use stdwire_frame::Charset;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod call;
pub mod inspect;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer framed requests on stdin/stdout.
    Serve(ServeArgs),
    /// Spawn a worker, send it one request and print the response.
    Call(CallArgs),
    /// Decode a captured request stream.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Call(args) => call::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Framing options shared by every command that touches the wire.
#[derive(Args, Debug, Clone)]
pub struct WireArgs {
    /// Charset of frame bodies (utf-8, iso-8859-1).
    #[arg(long, default_value = "utf-8")]
    pub charset: Charset,
    /// Line that terminates every message.
    #[arg(long, default_value = "#msg-end")]
    pub delimiter: String,
    /// Field name of the response payload (content, data).
    #[arg(long, default_value = "content")]
    pub content_key: ContentKey,
}

impl WireArgs {
    pub fn config(&self, mode: Mode) -> ChannelConfig {
        ChannelConfig::default()
            .with_mode(mode)
            .with_charset(self.charset)
            .with_delimiter(self.delimiter.clone())
            .with_content_key(self.content_key)
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum HandlerKind {
    /// Respond with the value of query parameter `operation`.
    Operation,
    /// Copy query and content back.
    Echo,
    /// Respond with the request id only.
    #[value(name = "none")]
    Nothing,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Announce readiness with `#proc-alive` before serving.
    #[arg(long)]
    pub worker: bool,
    /// Built-in request handler.
    #[arg(long, value_enum, default_value = "operation")]
    pub handler: HandlerKind,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Correlation id of the request.
    #[arg(long, default_value = "1")]
    pub id: String,
    /// Query parameter as KEY=VALUE (repeatable). VALUE is sent as JSON when
    /// it parses as JSON, otherwise as a string.
    #[arg(long = "query", short = 'q', value_name = "KEY=VALUE", value_parser = parse_query)]
    pub query: Vec<(String, Value)>,
    /// Raw text content.
    #[arg(long, conflicts_with = "json")]
    pub text: Option<String>,
    /// JSON content (validated, sent as JSON text).
    #[arg(long, conflicts_with = "text")]
    pub json: Option<String>,
    /// Expect the `#proc-alive` handshake from the worker.
    #[arg(long)]
    pub worker: bool,
    #[command(flatten)]
    pub wire: WireArgs,
    /// Worker program and its arguments.
    #[arg(required = true, last = true, value_name = "PROGRAM")]
    pub program: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Captured stream. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    #[command(flatten)]
    pub wire: WireArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_query(input: &str) -> Result<(String, Value), String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {input:?}"))?;
    if key.is_empty() {
        return Err("query key must not be empty".to_string());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
