use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EnvelopeError, Result};
use crate::error_info::ErrorInfo;
use crate::request::Request;
use crate::Query;

/// A response envelope, owned by exactly one request/response cycle.
///
/// The handler mutates it in place. Content writes overwrite each other;
/// `error` is independent of `content` and both may be present.
///
/// On the wire the payload may be named `content` or `data`; a non-null
/// `content` wins when a peer sends both.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "ResponseRepr")]
pub struct Response {
    pub(crate) id: Option<String>,
    pub(crate) query: Query,
    pub(crate) content: Option<Value>,
    pub(crate) error: Option<ErrorInfo>,
}

#[derive(Deserialize)]
struct ResponseRepr {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    query: Query,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorInfo>,
}

impl From<ResponseRepr> for Response {
    fn from(repr: ResponseRepr) -> Self {
        Self {
            id: repr.id,
            query: repr.query,
            content: repr.content.or(repr.data),
            error: repr.error,
        }
    }
}

impl Response {
    /// Create an empty response carrying the given correlation id.
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Create an empty response correlated with `request`.
    pub fn for_request(request: &Request) -> Self {
        Self::new(request.id.clone())
    }

    /// Correlation id copied from the request.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Look up a response query parameter.
    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    /// Look up a response query parameter as text.
    pub fn query_string(&self, key: &str) -> Option<String> {
        match self.query(key)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// All response query parameters.
    pub fn queries(&self) -> &Query {
        &self.query
    }

    /// Set a response query parameter.
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.query.insert(key.into(), value.into());
    }

    /// Remove a response query parameter, returning its previous value.
    pub fn remove_query(&mut self, key: &str) -> Option<Value> {
        self.query.remove(key)
    }

    /// Set raw text content, replacing any previous content.
    pub fn text(&mut self, content: impl Into<String>) {
        self.content = Some(Value::String(content.into()));
    }

    /// Serialize `value` to JSON text now and use it as content.
    ///
    /// On failure the previous content is left unchanged.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let text = serde_json::to_string(value).map_err(EnvelopeError::ResponseSerialize)?;
        self.content = Some(Value::String(text));
        Ok(())
    }

    /// Use a structured JSON value as content, replacing any previous content.
    pub fn value(&mut self, value: Value) {
        self.content = Some(value);
    }

    /// Drop any content.
    pub fn clear_content(&mut self) {
        self.content = None;
    }

    /// Current content.
    pub fn content(&self) -> Option<&Value> {
        self.content.as_ref()
    }

    /// Current content if it is text.
    pub fn content_text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Value::as_str)
    }

    /// Parse the content as `T`.
    ///
    /// Text content is parsed as JSON text; structured content is converted
    /// directly. Returns `Ok(None)` when there is no content.
    pub fn parse_content<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let parsed = match &self.content {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(text)) => serde_json::from_str(text),
            Some(other) => serde_json::from_value(other.clone()),
        };
        parsed.map(Some).map_err(EnvelopeError::ResponseParse)
    }

    /// Record a failure.
    pub fn set_error(&mut self, error: impl Into<ErrorInfo>) {
        self.error = Some(error.into());
    }

    /// Drop a recorded failure.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Recorded failure, if any.
    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    /// Whether a failure was recorded.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Query, D::Error> {
    Ok(Option::<Query>::deserialize(deserializer)?.unwrap_or_default())
}
