use crate::config::Config;
use crate::format::Pipeline;
use crate::level::Level;
use crate::record::{Fields, LogRecord, Message, Meta};
use crate::transport::Transport;
use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

struct Shared {
    config: Arc<Config>,
    pipeline: Pipeline,
    transports: Vec<Arc<dyn Transport>>,
}

/// A labelled, levelled logger.
///
/// The base logger owns the pipeline and transports; children created
/// with [`Logger::child`] share them and add their own bound fields.
/// Cloning is cheap.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    bound: Arc<Fields>,
}

impl Logger {
    /// Build the base logger. The renderer is selected here, once.
    pub fn new(config: Arc<Config>, transports: Vec<Arc<dyn Transport>>) -> Self {
        let pipeline = Pipeline::new(Arc::clone(&config));
        Self {
            shared: Arc::new(Shared {
                config,
                pipeline,
                transports,
            }),
            bound: Arc::new(Fields::new()),
        }
    }

    /// Derive a logger that merges `fields` into every record. `self` is
    /// left unchanged.
    pub fn child(&self, fields: Fields) -> Logger {
        let mut bound = (*self.bound).clone();
        bound.extend(fields);
        Logger {
            shared: Arc::clone(&self.shared),
            bound: Arc::new(bound),
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn level(&self) -> Level {
        self.shared.config.log_level()
    }

    pub fn bound_metadata(&self) -> &Fields {
        &self.bound
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        level.passes(self.level())
    }

    /// Emit one record. Records below the threshold are discarded before
    /// any formatting work.
    pub fn log(&self, level: Level, message: impl Into<Message>, meta: Meta) -> &Self {
        if !self.is_enabled(level) {
            return self;
        }

        let mut fields = (*self.bound).clone();
        fields.extend(meta.fields);
        let record = LogRecord {
            level,
            message: Some(message.into()),
            timestamp: Some(Utc::now()),
            label: None,
            fields,
            error: meta.error,
        };

        let rendered = self.shared.pipeline.process(record);
        for transport in &self.shared.transports {
            transport.log(&rendered);
        }
        self
    }

    pub fn debug(&self, message: impl Into<Message>, meta: Meta) -> &Self {
        self.log(Level::Debug, message, meta)
    }

    pub fn verbose(&self, message: impl Into<Message>, meta: Meta) -> &Self {
        self.log(Level::Verbose, message, meta)
    }

    pub fn info(&self, message: impl Into<Message>, meta: Meta) -> &Self {
        self.log(Level::Info, message, meta)
    }

    pub fn warn(&self, message: impl Into<Message>, meta: Meta) -> &Self {
        self.log(Level::Warn, message, meta)
    }

    pub fn error(&self, message: impl Into<Message>, meta: Meta) -> &Self {
        self.log(Level::Error, message, meta)
    }

    /// Bound request id, if this logger was derived for a request.
    pub fn request_id(&self) -> Option<&str> {
        match self.bound.get("requestId") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("label", &self.shared.config.label())
            .field("level", &self.level())
            .field("bound", &self.bound)
            .field("transports", &self.shared.transports.len())
            .finish()
    }
}
