//! Request-scoped structured logging.
//!
//! A [`ContextLogger`] resolves every call to the logger of the request
//! the calling task belongs to, so code at any depth logs with that
//! request's id without passing it around. Records then run through a
//! fixed [format pipeline](format) and are handed to [transports](transport).

pub mod config;
pub mod context;
pub mod env;
pub mod facade;
pub mod format;
pub mod id;
pub mod init;
pub mod layer;
pub mod level;
pub mod logger;
pub mod noop_sink;
pub mod record;
pub mod sanitizer;
pub mod sink;
pub mod stringify;
pub mod transport;

#[cfg(feature = "middleware")]
pub mod middleware;

pub use config::{Config, ConfigError, Options};
pub use context::RequestContext;
pub use facade::ContextLogger;
pub use level::Level;
pub use logger::Logger;
pub use record::{ErrorInfo, Message, Meta};
