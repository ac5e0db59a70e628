use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::Serialize;
use serde_json::Value;

use crate::error::{EnvelopeError, Result};
use crate::error_info::ErrorInfo;
use crate::request::Request;
use crate::response::Response;
use crate::Query;

/// Body sent back when a frame cannot be decoded into a request.
///
/// Fixed text: nothing from the offending frame is echoed back.
pub const REQUEST_PARSE_FAILURE: &str =
    r#"{"error":{"message":"Error while parsing the request","kind":"request_parse"}}"#;

/// Body sent back when a response cannot be encoded.
pub const RESPONSE_SERIALIZE_FAILURE: &str =
    r#"{"error":{"message":"Error while serializing the response","kind":"response_serialize"}}"#;

/// Wire name of the envelope payload field.
///
/// Decoding always accepts both names; this only selects what gets written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentKey {
    /// `"content"`.
    #[default]
    Content,
    /// `"data"`.
    Data,
}

impl ContentKey {
    /// Field name on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKey::Content => "content",
            ContentKey::Data => "data",
        }
    }

    fn split<T>(self, value: T) -> (Option<T>, Option<T>) {
        match self {
            ContentKey::Content => (Some(value), None),
            ContentKey::Data => (None, Some(value)),
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "content" => Ok(ContentKey::Content),
            "data" => Ok(ContentKey::Data),
            other => Err(format!("unknown content key: {other}")),
        }
    }
}

#[derive(Serialize)]
struct WireResponse<'a> {
    id: Option<&'a str>,
    query: &'a Query,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<Option<&'a Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Option<&'a Value>>,
    error: Option<&'a ErrorInfo>,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    id: Option<&'a str>,
    query: Option<&'a Query>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Option<&'a str>>,
}

/// Decode a frame body into a request.
///
/// The body must be a JSON object; every field is optional.
pub fn decode_request(body: &str) -> Result<Request> {
    let value: Value = serde_json::from_str(body).map_err(EnvelopeError::RequestParse)?;
    if !value.is_object() {
        return Err(EnvelopeError::RequestParse(serde_json::Error::custom(
            "request must be a JSON object",
        )));
    }
    serde_json::from_value(value).map_err(EnvelopeError::RequestParse)
}

/// Encode a response as JSON text.
///
/// Fields are written in a fixed order (`id`, `query`, payload, `error`) and
/// empty values as `null`, so the same response always encodes to the same
/// bytes.
pub fn encode_response(response: &Response, key: ContentKey) -> Result<String> {
    let (content, data) = key.split(response.content.as_ref());
    let wire = WireResponse {
        id: response.id.as_deref(),
        query: &response.query,
        content,
        data,
        error: response.error.as_ref(),
    };
    serde_json::to_string(&wire).map_err(EnvelopeError::ResponseSerialize)
}

/// Encode a request as JSON text (parent side).
pub fn encode_request(request: &Request, key: ContentKey) -> Result<String> {
    let (content, data) = key.split(request.content.as_deref());
    let wire = WireRequest {
        id: request.id.as_deref(),
        query: request.query.as_ref(),
        content,
        data,
    };
    serde_json::to_string(&wire).map_err(EnvelopeError::RequestSerialize)
}

/// Decode a frame body into a response (parent side).
pub fn decode_response(body: &str) -> Result<Response> {
    serde_json::from_str(body).map_err(EnvelopeError::ResponseParse)
}
