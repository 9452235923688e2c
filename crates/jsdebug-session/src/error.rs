//! Session, transport, frame, and configuration errors.

use std::io;
use std::path::PathBuf;

use jsdebug_protocol::{BindingError, ResolutionError, TypeId};
use smol_str::SmolStr;
use thiserror::Error;

use crate::context::ContextToken;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid frame: {0}")]
    Framing(SmolStr),

    #[error("transport closed")]
    Closed,

    #[error("unsupported endpoint '{0}'")]
    Endpoint(SmolStr),
}

/// Synchronous failure of a `send` call; neither callback fires.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("{0} is no longer current")]
    ContextDismissed(ContextToken),

    #[error("failed to encode command '{command}': {source}")]
    Encode {
        command: SmolStr,
        source: serde_json::Error,
    },

    #[error("payload type '{0}' is not registered")]
    UnknownType(TypeId),

    #[error("cannot open protocol log {}: {source}", path.display())]
    Transcript { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Handed to a call's failure callback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallFailure {
    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: SmolStr },

    #[error("remote error: {message}")]
    Remote { code: Option<i64>, message: SmolStr },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl CallFailure {
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }
}

/// An incoming frame that could not be classified.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized frame: {0}")]
    Unrecognized(#[from] ResolutionError),

    #[error("malformed frame: {0}")]
    Malformed(#[from] BindingError),

    #[error("envelope type '{0}' is not registered")]
    MissingEnvelope(&'static str),

    #[error("invalid sequence id {0}")]
    InvalidSeq(i64),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {key} '{value}'")]
    Invalid { key: &'static str, value: SmolStr },
}
