use crate::env::{
    env_opt, LOG_ATTACH_REQUEST_ID_ENV, LOG_COLORIZE_ENV, LOG_ENVIRONMENT_ENV, LOG_LABEL_ENV,
    LOG_LEVEL_ENV, LOG_STRUCTURED_ENV, LOG_VERSION_ENV,
};
use crate::level::Level;
use crate::stringify::stable_stringify;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Violations keyed by field name, then by rule name, to a description.
pub type Violations = BTreeMap<String, BTreeMap<String, String>>;

/// Raised when [`Options`] fail validation. No logger is built.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid logger configuration: {}", render_violations(.violations))]
pub struct ConfigError {
    pub violations: Violations,
}

fn render_violations(violations: &Violations) -> String {
    match serde_json::to_value(violations) {
        Ok(value) => stable_stringify(&value),
        Err(_) => format!("{:?}", violations),
    }
}

/// Unvalidated logger options. Every field is optional and falls back to
/// its default during [`Config::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub label: Option<String>,
    pub log_level: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub use_structured_format: Option<bool>,
    pub attach_request_id: Option<bool>,
    pub colorize: Option<bool>,
    /// Keys that are not options; each one is reported as a violation.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
    #[serde(skip)]
    parse_errors: Violations,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn use_structured_format(mut self, enabled: bool) -> Self {
        self.use_structured_format = Some(enabled);
        self
    }

    pub fn attach_request_id(mut self, enabled: bool) -> Self {
        self.attach_request_id = Some(enabled);
        self
    }

    pub fn colorize(mut self, enabled: bool) -> Self {
        self.colorize = Some(enabled);
        self
    }

    /// Build options from the `LOG_*` environment variables.
    ///
    /// Unset variables leave the option at its default. Boolean variables
    /// holding anything other than `true`, `false`, `1` or `0` surface as
    /// violations when the options are validated.
    pub fn from_env() -> Self {
        let mut options = Options {
            label: env_opt(LOG_LABEL_ENV),
            log_level: env_opt(LOG_LEVEL_ENV),
            environment: env_opt(LOG_ENVIRONMENT_ENV),
            version: env_opt(LOG_VERSION_ENV),
            ..Options::default()
        };
        options.use_structured_format =
            options.env_bool(LOG_STRUCTURED_ENV, "useStructuredFormat");
        options.attach_request_id =
            options.env_bool(LOG_ATTACH_REQUEST_ID_ENV, "attachRequestId");
        options.colorize = options.env_bool(LOG_COLORIZE_ENV, "colorize");
        options
    }

    fn env_bool(&mut self, key: &str, field: &str) -> Option<bool> {
        let raw = env_opt(key)?;
        match parse_bool(&raw) {
            Some(value) => Some(value),
            None => {
                self.parse_errors.entry(field.to_string()).or_default().insert(
                    "is_boolean".to_string(),
                    format!("{} must be a boolean value", field),
                );
                None
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Validated, immutable logger settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) label: String,
    pub(crate) log_level: Level,
    pub(crate) environment: String,
    pub(crate) version: String,
    pub(crate) use_structured_format: bool,
    pub(crate) attach_request_id: bool,
    pub(crate) colorize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: "app".to_string(),
            log_level: Level::Error,
            environment: "development".to_string(),
            version: "unknown".to_string(),
            use_structured_format: false,
            attach_request_id: false,
            colorize: true,
        }
    }
}

impl Config {
    /// Apply defaults and validate. All violations are collected before
    /// returning, so one error reports every bad field.
    pub fn validate(options: Options) -> Result<Config, ConfigError> {
        let mut violations = options.parse_errors;
        let defaults = Config::default();

        for key in options.unknown.keys() {
            violations.entry(key.clone()).or_default().insert(
                "whitelist".to_string(),
                format!("property {} should not exist", key),
            );
        }

        let label = non_empty("label", options.label, defaults.label, &mut violations);
        let environment = non_empty(
            "environment",
            options.environment,
            defaults.environment,
            &mut violations,
        );
        let version = non_empty("version", options.version, defaults.version, &mut violations);

        let log_level = match options.log_level {
            None => defaults.log_level,
            Some(raw) => match raw.parse::<Level>() {
                Ok(level) => level,
                Err(_) => {
                    violations.entry("logLevel".to_string()).or_default().insert(
                        "is_in".to_string(),
                        format!(
                            "logLevel must be one of the following values: {}",
                            Level::NAMES.join(", ")
                        ),
                    );
                    defaults.log_level
                }
            },
        };

        if !violations.is_empty() {
            return Err(ConfigError { violations });
        }

        Ok(Config {
            label,
            log_level,
            environment,
            version,
            use_structured_format: options
                .use_structured_format
                .unwrap_or(defaults.use_structured_format),
            attach_request_id: options.attach_request_id.unwrap_or(defaults.attach_request_id),
            colorize: options.colorize.unwrap_or(defaults.colorize),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn use_structured_format(&self) -> bool {
        self.use_structured_format
    }

    pub fn attach_request_id(&self) -> bool {
        self.attach_request_id
    }

    pub fn colorize(&self) -> bool {
        self.colorize
    }
}

fn non_empty(
    field: &str,
    value: Option<String>,
    default: String,
    violations: &mut Violations,
) -> String {
    match value {
        None => default,
        Some(v) if v.trim().is_empty() => {
            violations.entry(field.to_string()).or_default().insert(
                "is_not_empty".to_string(),
                format!("{} should not be empty", field),
            );
            default
        }
        Some(v) => v,
    }
}
