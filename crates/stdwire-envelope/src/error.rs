/// Errors raised while converting envelopes to and from JSON text.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The frame body is not a JSON request, or request content does not
    /// match the requested shape.
    #[error("error while parsing the request: {0}")]
    RequestParse(#[source] serde_json::Error),

    /// The response or a value assigned to its content cannot be written as JSON.
    #[error("error while serializing the response: {0}")]
    ResponseSerialize(#[source] serde_json::Error),

    /// A request built on the parent side cannot be written as JSON.
    #[error("error while serializing the request: {0}")]
    RequestSerialize(#[source] serde_json::Error),

    /// A frame received on the parent side is not a JSON response.
    #[error("error while parsing the response: {0}")]
    ResponseParse(#[source] serde_json::Error),
}

impl EnvelopeError {
    /// Short machine-readable tag for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            EnvelopeError::RequestParse(_) => "request_parse",
            EnvelopeError::ResponseSerialize(_) => "response_serialize",
            EnvelopeError::RequestSerialize(_) => "request_serialize",
            EnvelopeError::ResponseParse(_) => "response_parse",
        }
    }
}

pub type Result<T> = std::result::Result<T, EnvelopeError>;
