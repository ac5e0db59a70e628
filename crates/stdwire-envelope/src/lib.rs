//! JSON request/response envelopes carried inside stdio frames.
//!
//! ```text
//! Request  {"id": "a7bf6a", "query": {"operation": "ping"}, "content": "..."}
//! Response {"id": "a7bf6a", "query": {}, "content": "pong", "error": null}
//! ```
//!
//! The `id` copied from request to response is the only correlation between
//! the two; nothing else on the wire orders or matches messages.

pub mod codec;
pub mod error;
pub mod error_info;
pub mod request;
pub mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, ContentKey,
    REQUEST_PARSE_FAILURE, RESPONSE_SERIALIZE_FAILURE,
};
pub use error::{EnvelopeError, Result};
pub use error_info::ErrorInfo;
pub use request::Request;
pub use response::Response;

/// Loosely typed query map shared by requests and responses.
pub type Query = serde_json::Map<String, serde_json::Value>;
