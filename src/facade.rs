use crate::config::{Config, ConfigError, Options};
use crate::context::{self, RequestContext};
use crate::id::{IdGenerator, UuidGenerator};
use crate::level::Level;
use crate::logger::Logger;
use crate::record::{Fields, Message, Meta};
use crate::transport::{ConsoleTransport, Transport};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::task::futures::TaskLocalFuture;

/// The logger application code holds.
///
/// It keeps no fixed target: every call looks up the request context of
/// the calling task and forwards to that request's child logger, or to the
/// base logger when no request is active. Clones share the same base.
#[derive(Clone)]
pub struct ContextLogger {
    base: Logger,
    ids: Arc<dyn IdGenerator>,
}

impl ContextLogger {
    /// Validate `options` and build a logger writing to the console.
    pub fn new(options: Options) -> Result<Self, ConfigError> {
        let console: ConsoleTransport = ConsoleTransport::default();
        Self::with_transports(options, vec![Arc::new(console)])
    }

    pub fn with_transports(
        options: Options,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Result<Self, ConfigError> {
        let config = Arc::new(Config::validate(options)?);
        Ok(Self {
            base: Logger::new(config, transports),
            ids: Arc::new(UuidGenerator),
        })
    }

    /// Replace the request id source.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn config(&self) -> &Config {
        self.base.config()
    }

    /// The base logger, used when no request is active.
    pub fn logger(&self) -> &Logger {
        &self.base
    }

    /// The logger a call made right now would go to.
    pub fn current_logger(&self) -> Logger {
        context::current()
            .map(|ctx| ctx.logger().clone())
            .unwrap_or_else(|| self.base.clone())
    }

    /// Create a context for a new request: a fresh id and a child logger
    /// bound to it.
    pub fn new_request_context(&self) -> Arc<RequestContext> {
        let request_id = self.ids.generate();
        let mut fields = Fields::new();
        fields.insert("requestId".to_string(), Value::String(request_id.clone()));
        Arc::new(RequestContext::new(request_id, self.base.child(fields)))
    }

    /// Run `fut` as a new request.
    pub fn in_request<F: Future>(&self, fut: F) -> TaskLocalFuture<Arc<RequestContext>, F> {
        context::scope(self.new_request_context(), fut)
    }

    pub fn log_with(&self, level: Level, message: impl Into<Message>, meta: Meta) -> Logger {
        let logger = self.current_logger();
        logger.log(level, message, meta);
        logger
    }

    pub fn debug(&self, message: impl Into<Message>, context: Option<&str>) -> Logger {
        self.log_with(Level::Debug, message, Meta::new().opt_field("context", context))
    }

    pub fn verbose(&self, message: impl Into<Message>, context: Option<&str>) -> Logger {
        self.log_with(Level::Verbose, message, Meta::new().opt_field("context", context))
    }

    pub fn info(&self, message: impl Into<Message>, context: Option<&str>) -> Logger {
        self.log_with(Level::Info, message, Meta::new().opt_field("context", context))
    }

    /// Synonym for [`ContextLogger::info`].
    pub fn log(&self, message: impl Into<Message>, context: Option<&str>) -> Logger {
        self.info(message, context)
    }

    pub fn warn(&self, message: impl Into<Message>, context: Option<&str>) -> Logger {
        self.log_with(Level::Warn, message, Meta::new().opt_field("context", context))
    }

    /// `trace` is recorded as its own field, never spliced into the message.
    pub fn error(
        &self,
        message: impl Into<Message>,
        trace: Option<&str>,
        context: Option<&str>,
    ) -> Logger {
        let meta = Meta::new()
            .opt_field("trace", trace)
            .opt_field("context", context);
        self.log_with(Level::Error, message, meta)
    }
}

impl fmt::Debug for ContextLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLogger").field("base", &self.base).finish_non_exhaustive()
    }
}
