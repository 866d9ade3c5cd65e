/// Environment variable names read by [`Options::from_env`](crate::config::Options::from_env).
///
/// These are purely helpers; the logger itself never reads the
/// environment after construction.

/// Logger label, e.g. the service name.
pub const LOG_LABEL_ENV: &str = "LOG_LABEL";

/// Threshold level: `debug`, `verbose`, `info` (or `log`), `warn`, `error`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Deployment environment tag, e.g. `production`.
pub const LOG_ENVIRONMENT_ENV: &str = "LOG_ENVIRONMENT";

/// Service version, usually a commit hash.
pub const LOG_VERSION_ENV: &str = "LOG_VERSION";

/// `true` selects the structured (JSON) renderer.
pub const LOG_STRUCTURED_ENV: &str = "LOG_STRUCTURED";

/// `true` injects the active request id into every record.
pub const LOG_ATTACH_REQUEST_ID_ENV: &str = "LOG_ATTACH_REQUEST_ID";

/// `false` disables ANSI colors in the text renderer.
pub const LOG_COLORIZE_ENV: &str = "LOG_COLORIZE";

/// Read an environment variable, treating unset and non-unicode values as absent.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
