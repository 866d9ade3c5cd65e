use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Severity of a log record, ordered from least to most severe.
///
/// A logger configured with a threshold emits a record only when the
/// record's level is at or above that threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Verbose,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Names accepted by [`Level::from_str`], including the `log` alias.
    pub const NAMES: [&'static str; 6] = ["debug", "error", "info", "log", "verbose", "warn"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Verbose => "verbose",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    /// Whether a record at `self` passes a logger whose threshold is `threshold`.
    pub fn passes(&self, threshold: Level) -> bool {
        *self >= threshold
    }

    /// ANSI color used by the text renderer for this level.
    pub(crate) fn color_code(&self) -> &'static str {
        match self {
            Level::Debug => "\x1b[34m",
            Level::Verbose => "\x1b[36m",
            Level::Info => "\x1b[32m",
            Level::Warn => "\x1b[33m",
            Level::Error => "\x1b[31m",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known level.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level `{0}`")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Level::Debug),
            "verbose" => Ok(Level::Verbose),
            // `log` is the conventional synonym for `info`.
            "info" | "log" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Debug < Level::Verbose);
        assert!(Level::Verbose < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn log_is_an_alias_for_info() {
        assert_eq!("log".parse::<Level>(), Ok(Level::Info));
        assert_eq!("info".parse::<Level>(), Ok(Level::Info));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn threshold_filtering() {
        assert!(!Level::Debug.passes(Level::Warn));
        assert!(Level::Warn.passes(Level::Warn));
        assert!(Level::Error.passes(Level::Warn));
    }

    #[test]
    fn tracing_levels_map_onto_five_levels() {
        assert_eq!(Level::from(&tracing::Level::TRACE), Level::Debug);
        assert_eq!(Level::from(&tracing::Level::DEBUG), Level::Debug);
        assert_eq!(Level::from(&tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(&tracing::Level::ERROR), Level::Error);
    }
}
