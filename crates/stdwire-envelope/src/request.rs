use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EnvelopeError, Result};
use crate::Query;

/// A decoded request envelope.
///
/// Validation is loose on purpose: a missing or null `id` is carried as
/// `None`, numeric ids are stringified, and `content` may arrive as `data`.
/// When both are present, a non-null `content` wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RequestRepr")]
pub struct Request {
    pub(crate) id: Option<String>,
    pub(crate) query: Option<Query>,
    pub(crate) content: Option<String>,
}

#[derive(Deserialize)]
struct RequestRepr {
    #[serde(default, deserialize_with = "loose_id")]
    id: Option<String>,
    #[serde(default)]
    query: Option<Query>,
    #[serde(default, deserialize_with = "loose_text")]
    content: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    data: Option<String>,
}

impl From<RequestRepr> for Request {
    fn from(repr: RequestRepr) -> Self {
        Self {
            id: repr.id,
            query: repr.query,
            content: repr.content.or(repr.data),
        }
    }
}

impl Request {
    /// Start building a request with the given correlation id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            query: None,
            content: None,
        }
    }

    /// Add one query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query
            .get_or_insert_with(Query::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the raw text content.
    pub fn with_text(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Serialize a value as the text content.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let text = serde_json::to_string(value).map_err(EnvelopeError::RequestSerialize)?;
        self.content = Some(text);
        Ok(self)
    }

    /// Correlation id, if the peer sent one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Look up a query parameter.
    pub fn query(&self, key: &str) -> Option<&Value> {
        self.query.as_ref().and_then(|query| query.get(key))
    }

    /// Look up a query parameter as text.
    ///
    /// Strings come back unquoted; other values in their JSON form. A null
    /// parameter reads as absent.
    pub fn query_string(&self, key: &str) -> Option<String> {
        match self.query(key)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The whole query map, if the peer sent one.
    pub fn queries(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Raw text content.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Parse the text content as `T`.
    ///
    /// Returns `Ok(None)` when there is no content.
    pub fn json<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.content
            .as_deref()
            .map(serde_json::from_str::<T>)
            .transpose()
            .map_err(EnvelopeError::RequestParse)
    }
}

fn loose_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(id)) => Ok(Some(id)),
        Some(Value::Number(id)) => Ok(Some(id.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "id must be a string or number, got {other}"
        ))),
    }
}

// Structured content is kept as its JSON text so `json()` can still parse it.
fn loose_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Ok(Some(other.to_string())),
    }
}
