use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Query;

/// Serializable description of a failure, carried in `Response.error`.
///
/// Handlers can return an `ErrorInfo` as their error to pick the `kind` tag
/// and `detail` map that reach the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ErrorRepr")]
pub struct ErrorInfo {
    /// Human-readable message.
    pub message: String,
    /// Optional failure class tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Query>,
}

impl ErrorInfo {
    /// Create an error description with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            detail: None,
        }
    }

    /// Set the failure class tag.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Add one entry to the detail map.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.detail
            .get_or_insert_with(Query::new)
            .insert(key.into(), value.into());
        self
    }

    /// Describe any error value. The `source()` chain, if present, is kept
    /// under `detail.causes`.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut info = Self::new(err.to_string());

        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(Value::String(cause.to_string()));
            source = cause.source();
        }
        if !causes.is_empty() {
            info = info.with_detail("causes", Value::Array(causes));
        }
        info
    }

    /// Failure message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Failure class tag, if any.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{kind}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ErrorInfo {}

impl From<&str> for ErrorInfo {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ErrorInfo {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

// Peers may send a bare string or an object with extra fields.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorRepr {
    Message(String),
    Structured {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        detail: Option<Query>,
    },
}

impl From<ErrorRepr> for ErrorInfo {
    fn from(repr: ErrorRepr) -> Self {
        match repr {
            ErrorRepr::Message(message) => Self::new(message),
            ErrorRepr::Structured {
                message,
                kind,
                detail,
            } => Self {
                message: message.unwrap_or_default(),
                kind,
                detail,
            },
        }
    }
}
