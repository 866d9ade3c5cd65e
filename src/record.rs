use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeMap;
use std::error::Error;

/// Field map carried by a record. Ordered so that rendering never depends
/// on insertion order.
pub type Fields = BTreeMap<String, Value>;

/// The message of a record: plain text, or a structured value that the
/// renderers stringify deterministically.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Structured(Value),
}

impl Message {
    /// Build a structured message from any serializable value.
    ///
    /// Values that fail to serialize degrade to a text placeholder instead
    /// of failing the log call.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(Value::String(s)) => Message::Text(s),
            Ok(v) => Message::Structured(v),
            Err(e) => Message::Text(format!("[unserializable message: {}]", e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Message::Text(s) => s.is_empty(),
            Message::Structured(v) => v.is_null(),
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::Text(s.to_string())
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::Text(s)
    }
}

impl From<&String> for Message {
    fn from(s: &String) -> Self {
        Message::Text(s.clone())
    }
}

impl From<Value> for Message {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Message::Text(s),
            other => Message::Structured(other),
        }
    }
}

/// Error value attached to a record, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// Raw multi-line stack, if one was captured.
    pub stack: Option<String>,
    pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
            cause: None,
        }
    }

    /// Describe a concrete error. The `source()` chain becomes the
    /// `cause` chain.
    pub fn from_error<E: Error + ?Sized>(error: &E) -> Self {
        let mut info = Self::new(short_type_name(std::any::type_name::<E>()), error.to_string());
        info.cause = error.source().map(|source| Box::new(Self::from_source(source)));
        info
    }

    /// Like [`ErrorInfo::from_error`], additionally capturing a backtrace
    /// of the calling thread when backtraces are enabled in the process.
    pub fn capture<E: Error + ?Sized>(error: &E) -> Self {
        let backtrace = Backtrace::capture();
        let mut info = Self::from_error(error);
        if backtrace.status() == BacktraceStatus::Captured {
            info.stack = Some(backtrace.to_string());
        }
        info
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    fn from_source(source: &(dyn Error + 'static)) -> Self {
        let mut info = Self::new("Error", source.to_string());
        info.cause = source.source().map(|next| Box::new(Self::from_source(next)));
        info
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    let base = base.trim_start_matches("dyn ");
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Extra data attached to a single log call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    pub(crate) fields: Fields,
    pub(crate) error: Option<ErrorInfo>,
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a field. Values that cannot be serialized are recorded as a
    /// text placeholder.
    pub fn field<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|e| Value::String(format!("[unserializable: {}]", e)));
        self.fields.insert(key.into(), value);
        self
    }

    /// Attach a string field only when a value is present.
    pub fn opt_field(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.fields.insert(key.into(), Value::String(value.to_string()));
        }
        self
    }

    pub fn error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }
}

impl From<Fields> for Meta {
    fn from(fields: Fields) -> Self {
        Self { fields, error: None }
    }
}

/// A record travelling through the format pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: Level,
    pub message: Option<Message>,
    pub timestamp: Option<DateTime<Utc>>,
    pub label: Option<String>,
    pub fields: Fields,
    /// Error not yet normalized. The normalization stage moves it into
    /// `fields["error"]` for error-level records.
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<Message>) -> Self {
        Self {
            level,
            message: Some(message.into()),
            timestamp: None,
            label: None,
            fields: Fields::new(),
            error: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }
}
