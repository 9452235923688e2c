//! Session configuration loading (`jsdebug.toml`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use jsdebug_protocol::{AmbiguityPolicy, BindMode};
use serde::Deserialize;

use crate::dialect::Dialect;
use crate::error::ConfigError;

/// Overrides `[log] protocol_log` when set.
pub const PROTOCOL_LOG_ENV: &str = "JSDEBUG_PROTOCOL_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub dialect: Dialect,
    /// Binding mode for response bodies.
    pub response_mode: BindMode,
    /// Binding mode for event payloads.
    pub event_mode: BindMode,
    pub ambiguity: AmbiguityPolicy,
    pub protocol_log: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::V8,
            response_mode: BindMode::Eager,
            event_mode: BindMode::Lazy,
            ambiguity: AmbiguityPolicy::Reject,
            protocol_log: None,
        }
    }
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: ConfigToml = toml::from_str(text)?;
        raw.into_config()
    }

    /// Applies environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_protocol_log_override(std::env::var_os(PROTOCOL_LOG_ENV))
    }

    fn with_protocol_log_override(mut self, value: Option<OsString>) -> Self {
        if let Some(path) = value.filter(|path| !path.is_empty()) {
            self.protocol_log = Some(PathBuf::from(path));
        }
        self
    }
}

impl FromStr for Dialect {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "v8" | "native" => Ok(Self::V8),
            "wip" | "webinspector" | "devtools" => Ok(Self::Wip),
            _ => Err(invalid("session.dialect", text)),
        }
    }
}

fn parse_mode(key: &'static str, text: &str) -> Result<BindMode, ConfigError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "eager" => Ok(BindMode::Eager),
        "lazy" => Ok(BindMode::Lazy),
        _ => Err(invalid(key, text)),
    }
}

fn parse_ambiguity(text: &str) -> Result<AmbiguityPolicy, ConfigError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "reject" => Ok(AmbiguityPolicy::Reject),
        "first-match" | "first_match" => Ok(AmbiguityPolicy::FirstMatch),
        _ => Err(invalid("session.ambiguity", text)),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.into(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    session: Option<SessionSection>,
    log: Option<LogSection>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionSection {
    dialect: Option<String>,
    response_mode: Option<String>,
    event_mode: Option<String>,
    ambiguity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LogSection {
    protocol_log: Option<String>,
}

impl ConfigToml {
    fn into_config(self) -> Result<SessionConfig, ConfigError> {
        let defaults = SessionConfig::default();
        let session = self.session.unwrap_or_default();
        let log = self.log.unwrap_or_default();
        Ok(SessionConfig {
            dialect: match session.dialect.as_deref() {
                Some(text) => text.parse()?,
                None => defaults.dialect,
            },
            response_mode: match session.response_mode.as_deref() {
                Some(text) => parse_mode("session.response_mode", text)?,
                None => defaults.response_mode,
            },
            event_mode: match session.event_mode.as_deref() {
                Some(text) => parse_mode("session.event_mode", text)?,
                None => defaults.event_mode,
            },
            ambiguity: match session.ambiguity.as_deref() {
                Some(text) => parse_ambiguity(text)?,
                None => defaults.ambiguity,
            },
            protocol_log: log
                .protocol_log
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
        })
    }
}
