//! Format pipeline.
//!
//! Every record passes through the same ordered stages:
//! metadata injection, error normalization, label attachment and finally
//! one terminal renderer chosen when the pipeline is built. Each stage is
//! a plain function from record to record.

use crate::config::Config;
use crate::context;
use crate::level::Level;
use crate::record::{ErrorInfo, Fields, LogRecord, Message};
use crate::stringify::stable_stringify;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Keys the text renderer prints in fixed positions rather than in the
/// trailing JSON.
const TEXT_RESERVED: [&str; 5] = ["environment", "level", "label", "timestamp", "message"];

/// Keys the structured renderer lifts out of the `@fields` object.
const STRUCTURED_RESERVED: [&str; 2] = ["message", "timestamp"];

/// A rendered record, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub level: Level,
    pub line: String,
}

/// Terminal stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Text { colorize: bool },
    Structured,
}

impl Renderer {
    pub fn for_config(config: &Config) -> Self {
        if config.use_structured_format() {
            Renderer::Structured
        } else {
            Renderer::Text {
                colorize: config.colorize(),
            }
        }
    }

    pub fn render(&self, record: &LogRecord) -> String {
        match *self {
            Renderer::Text { colorize } => render_text(record, colorize),
            Renderer::Structured => render_structured(record),
        }
    }
}

/// The composed stages, bound to one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    renderer: Renderer,
}

impl Pipeline {
    pub fn new(config: Arc<Config>) -> Self {
        let renderer = Renderer::for_config(&config);
        Self { config, renderer }
    }

    pub fn renderer(&self) -> Renderer {
        self.renderer
    }

    /// Run the enrichment stages without rendering.
    pub fn transform(&self, record: LogRecord) -> LogRecord {
        let record = inject_metadata(&self.config, record);
        let record = normalize_error(record);
        attach_label(&self.config, record)
    }

    pub fn process(&self, record: LogRecord) -> Rendered {
        let record = self.transform(record);
        Rendered {
            level: record.level,
            line: self.renderer.render(&record),
        }
    }
}

/// Attach `environment`, `version` and, when enabled and a request
/// context is active, `requestId`. Outside a context the id is omitted.
pub fn inject_metadata(config: &Config, mut record: LogRecord) -> LogRecord {
    if config.attach_request_id() {
        if let Some(request_id) = context::request_id() {
            record.fields.insert("requestId".to_string(), Value::String(request_id));
        }
    }
    record
        .fields
        .insert("environment".to_string(), Value::String(config.environment().to_string()));
    record
        .fields
        .insert("version".to_string(), Value::String(config.version().to_string()));
    record
}

/// Flatten the error of an error-level record into `fields["error"]`.
/// Records at other levels keep their error untouched.
pub fn normalize_error(mut record: LogRecord) -> LogRecord {
    if record.level == Level::Error {
        if let Some(error) = record.error.take() {
            record.fields.insert("error".to_string(), normalized(&error));
        }
    }
    record
}

pub fn attach_label(config: &Config, mut record: LogRecord) -> LogRecord {
    record.label = Some(config.label().to_string());
    record
}

fn normalized(error: &ErrorInfo) -> Value {
    let mut out = Map::new();
    out.insert("name".to_string(), Value::String(error.name.clone()));
    out.insert("message".to_string(), Value::String(error.message.clone()));
    let stack = match &error.stack {
        Some(stack) => Value::Array(stack_frames(stack).into_iter().map(Value::String).collect()),
        None => Value::Null,
    };
    out.insert("stack".to_string(), stack);
    if let Some(cause) = &error.cause {
        out.insert("cause".to_string(), normalized(cause));
    }
    Value::Object(out)
}

/// One entry per non-blank stack line, trimmed.
pub fn stack_frames(stack: &str) -> Vec<String> {
    stack
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn message_text(message: &Message) -> String {
    match message {
        Message::Text(text) => text.clone(),
        Message::Structured(value) => stable_stringify(value),
    }
}

fn remaining(record: &LogRecord, reserved: &[&str]) -> Fields {
    let mut rest: Fields = record
        .fields
        .iter()
        .filter(|(key, _)| !reserved.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(error) = &record.error {
        rest.insert(
            "error".to_string(),
            Value::String(format!("{}: {}", error.name, error.message)),
        );
    }
    rest
}

fn fields_json(fields: Fields) -> Value {
    Value::Object(fields.into_iter().collect())
}

/// `[<environment>] <level>: [<label>] <message> <remaining fields as JSON>`
pub fn render_text(record: &LogRecord, colorize: bool) -> String {
    let environment = match record.fields.get("environment") {
        Some(Value::String(env)) => env.clone(),
        Some(other) => stable_stringify(other),
        None => String::new(),
    };
    let level = if colorize {
        format!("{}{}\x1b[39m", record.level.color_code(), record.level)
    } else {
        record.level.to_string()
    };
    let label = record.label.as_deref().unwrap_or_default();
    let message = record.message.as_ref().map(message_text).unwrap_or_default();
    let rest = fields_json(remaining(record, &TEXT_RESERVED));
    format!(
        "[{}] {}: [{}] {} {}",
        environment,
        level,
        label,
        message,
        stable_stringify(&rest)
    )
}

/// One JSON object per record: `@message` and `@timestamp` at the top
/// (each only when set), everything else under `@fields`.
pub fn render_structured(record: &LogRecord) -> String {
    let mut fields = remaining(record, &STRUCTURED_RESERVED);
    fields.insert("level".to_string(), Value::String(record.level.to_string()));
    if let Some(label) = &record.label {
        fields.insert("label".to_string(), Value::String(label.clone()));
    }

    let mut out = Map::new();
    if let Some(message) = record.message.as_ref().filter(|m| !m.is_empty()) {
        out.insert("@message".to_string(), Value::String(message_text(message)));
    }
    if let Some(timestamp) = record.timestamp {
        out.insert(
            "@timestamp".to_string(),
            Value::String(timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
    }
    out.insert("@fields".to_string(), fields_json(fields));
    stable_stringify(&Value::Object(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::context::{scope, RequestContext};
    use crate::logger::Logger;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn config(options: Options) -> Arc<Config> {
        Arc::new(Config::validate(options).unwrap())
    }

    fn timestamp() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 18, 19, 32, 31).unwrap() + chrono::Duration::milliseconds(495)
    }

    #[test]
    fn metadata_is_injected() {
        let config = config(Options::new().environment("staging").version("1.2.3"));
        let record = inject_metadata(&config, LogRecord::new(Level::Info, "hi"));
        assert_eq!(record.fields["environment"], json!("staging"));
        assert_eq!(record.fields["version"], json!("1.2.3"));
        assert!(!record.fields.contains_key("requestId"));
    }

    #[tokio::test]
    async fn request_id_is_read_from_the_active_context() {
        let config = config(Options::new().attach_request_id(true));
        let ctx = Arc::new(RequestContext::new(
            "req-42",
            Logger::new(Arc::clone(&config), Vec::new()),
        ));
        let record = scope(ctx, async {
            inject_metadata(&config, LogRecord::new(Level::Info, "hi"))
        })
        .await;
        assert_eq!(record.fields["requestId"], json!("req-42"));
    }

    #[test]
    fn request_id_is_omitted_without_context() {
        let config = config(Options::new().attach_request_id(true));
        let record = inject_metadata(&config, LogRecord::new(Level::Info, "hi"));
        assert!(!record.fields.contains_key("requestId"));
    }

    #[test]
    fn error_stack_becomes_frames() {
        let error = ErrorInfo::new("Error", "Simulated error")
            .with_stack("Error: Simulated error\n    at one (a.rs:1)\n    at two (b.rs:2)\n");
        let record = normalize_error(LogRecord::new(Level::Error, "error-test").with_error(error));
        assert!(record.error.is_none());
        assert_eq!(
            record.fields["error"],
            json!({
                "name": "Error",
                "message": "Simulated error",
                "stack": ["Error: Simulated error", "at one (a.rs:1)", "at two (b.rs:2)"]
            })
        );
    }

    #[test]
    fn missing_stack_is_null() {
        let error = ErrorInfo::new("Error", "Simulated error");
        let record = normalize_error(LogRecord::new(Level::Error, "error-test").with_error(error));
        assert_eq!(record.fields["error"]["stack"], Value::Null);
    }

    #[test]
    fn errors_below_error_level_pass_through() {
        let error = ErrorInfo::new("Timeout", "took too long");
        let record = normalize_error(LogRecord::new(Level::Warn, "slow").with_error(error.clone()));
        assert_eq!(record.error, Some(error));
        assert!(!record.fields.contains_key("error"));
        let line = render_text(&record, false);
        assert!(line.ends_with(r#"{"error":"Timeout: took too long"}"#));
    }

    #[test]
    fn text_line_layout() {
        let record = LogRecord::new(Level::Warn, "disk low")
            .with_field("environment", "production")
            .with_field("version", "abc")
            .with_field("context", "Disk")
            .with_timestamp(timestamp());
        let record = attach_label(&Config::default(), record);
        assert_eq!(
            render_text(&record, false),
            r#"[production] warn: [app] disk low {"context":"Disk","version":"abc"}"#
        );
    }

    #[test]
    fn text_level_is_colorized() {
        let record = LogRecord::new(Level::Error, "boom");
        assert!(render_text(&record, true).contains("\x1b[31merror\x1b[39m"));
    }

    #[test]
    fn structured_message_is_stringified_stably() {
        let record = LogRecord::new(Level::Info, json!({"z": 1, "a": {"c": 2, "b": 3}}));
        assert_eq!(
            render_text(&record, false),
            r#"[] info: [] {"a":{"b":3,"c":2},"z":1} {}"#
        );
    }

    #[test]
    fn structured_round_trip() {
        let record = LogRecord::new(Level::Info, "hello").with_timestamp(timestamp());
        let line = render_structured(&record);
        assert_eq!(
            line,
            r#"{"@fields":{"level":"info"},"@message":"hello","@timestamp":"2021-05-18T19:32:31.495Z"}"#
        );
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["@message"], json!("hello"));
        assert!(parsed["@fields"].get("message").is_none());
        assert!(parsed["@fields"].get("timestamp").is_none());
    }

    #[test]
    fn structured_without_message_or_timestamp() {
        let mut record = LogRecord::new(Level::Info, "");
        assert_eq!(render_structured(&record), r#"{"@fields":{"level":"info"}}"#);
        record.message = Some(Message::Structured(json!({"description": "unit-test"})));
        assert_eq!(
            render_structured(&record),
            r#"{"@fields":{"level":"info"},"@message":"{\"description\":\"unit-test\"}"}"#
        );
    }

    #[test]
    fn rendering_is_idempotent() {
        let pipeline = Pipeline::new(config(Options::new().use_structured_format(true)));
        let record = LogRecord::new(Level::Error, "x")
            .with_field("b", 1)
            .with_field("a", json!({"y": 1, "x": 2}))
            .with_timestamp(timestamp());
        let first = pipeline.process(record.clone());
        let second = pipeline.process(record);
        assert_eq!(first, second);
    }

    #[test]
    fn renderer_is_chosen_from_config() {
        let text = Pipeline::new(config(Options::new().colorize(false)));
        assert_eq!(text.renderer(), Renderer::Text { colorize: false });
        let structured = Pipeline::new(config(Options::new().use_structured_format(true)));
        assert_eq!(structured.renderer(), Renderer::Structured);
    }
}
