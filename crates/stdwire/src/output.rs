use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use stdwire_envelope::{encode_response, ContentKey, Query, Request, Response};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One frame of a captured request stream.
pub struct InspectedFrame {
    pub index: usize,
    pub size: usize,
    pub body: String,
    pub request: Result<Request, String>,
}

#[derive(Serialize)]
struct InspectedOutput<'a> {
    index: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a Query>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a InspectedFrame> for InspectedOutput<'a> {
    fn from(frame: &'a InspectedFrame) -> Self {
        let (request, error) = match &frame.request {
            Ok(request) => (Some(request), None),
            Err(message) => (None, Some(message.as_str())),
        };
        Self {
            index: frame.index,
            size: frame.size,
            id: request.and_then(Request::id),
            query: request.and_then(Request::queries),
            content: request.and_then(Request::text),
            error,
        }
    }
}

pub fn print_frames(frames: &[InspectedFrame], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for frame in frames {
                println!(
                    "{}",
                    serde_json::to_string(&InspectedOutput::from(frame))
                        .unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SIZE", "ID", "QUERY", "CONTENT"]);
            for frame in frames {
                let row = InspectedOutput::from(frame);
                let content = match row.error {
                    Some(error) => format!("<invalid: {error}>"),
                    None => row.content.unwrap_or("").to_string(),
                };
                table.add_row(vec![
                    row.index.to_string(),
                    row.size.to_string(),
                    row.id.unwrap_or("-").to_string(),
                    row.query.map(query_text).unwrap_or_default(),
                    content,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for frame in frames {
                let row = InspectedOutput::from(frame);
                match row.error {
                    Some(error) => println!("#{} size={} invalid: {error}", row.index, row.size),
                    None => println!(
                        "#{} size={} id={} query={} content={}",
                        row.index,
                        row.size,
                        row.id.unwrap_or("-"),
                        row.query.map(query_text).unwrap_or_else(|| "-".to_string()),
                        row.content.unwrap_or("-"),
                    ),
                }
            }
        }
        OutputFormat::Raw => {
            for frame in frames {
                print_raw(frame.body.as_bytes());
                print_raw(b"\n");
            }
        }
    }
}

pub fn print_response(response: &Response, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                encode_response(response, ContentKey::Content).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "QUERY", "CONTENT", "ERROR"])
                .add_row(vec![
                    response.id().unwrap_or("-").to_string(),
                    query_text(response.queries()),
                    content_text(response.content()),
                    response.error().map(ToString::to_string).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "id={} content={} error={}",
                response.id().unwrap_or("-"),
                content_text(response.content()),
                response
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        OutputFormat::Raw => {
            print_raw(content_text(response.content()).as_bytes());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn query_text(query: &Query) -> String {
    if query.is_empty() {
        return String::new();
    }
    serde_json::to_string(query).unwrap_or_default()
}

fn content_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
