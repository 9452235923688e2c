//! Wire dialects.
//! - encode: stamp a command with its sequence id
//! - classify: split incoming frames into responses and events
//! - lifecycle: suspend/resume transitions carried by the wire

use std::sync::Arc;

use jsdebug_protocol::{BindMode, Binder, BoundView, FieldValue};
use serde_json::{json, Map, Value};
use smol_str::SmolStr;

use crate::error::FrameError;
use crate::protocol::OutgoingCommand;
use crate::schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// V8 native debugger protocol (`seq`/`request_seq`).
    #[default]
    V8,
    /// WebInspector / DevTools protocol (`id`/`method`).
    Wip,
}

/// Debuggee state change announced by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Suspend,
    Resume,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response(ResponseFrame),
    Event(EventFrame),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFrame {
    pub seq: u64,
    pub outcome: Result<Value, RemoteError>,
    /// Handle entries carried alongside the body.
    pub refs: Vec<(i64, Arc<Value>)>,
    /// Whether the debuggee runs after handling the command, when reported.
    pub running: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub code: Option<i64>,
    pub message: SmolStr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventFrame {
    pub name: SmolStr,
    pub body: Value,
}

impl Dialect {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::V8 => "v8",
            Self::Wip => "wip",
        }
    }

    /// Polymorphic schema every incoming frame resolves against.
    #[must_use]
    pub fn envelope_type(self) -> &'static str {
        match self {
            Self::V8 => schema::V8_INCOMING,
            Self::Wip => schema::WIP_INCOMING,
        }
    }

    pub fn encode(self, seq: u64, command: &OutgoingCommand) -> Result<String, serde_json::Error> {
        let mut frame = Map::new();
        match self {
            Self::V8 => {
                frame.insert("seq".into(), json!(seq));
                frame.insert("type".into(), json!("request"));
                frame.insert("command".into(), json!(command.name().as_str()));
                if let Some(params) = command.params() {
                    frame.insert("arguments".into(), params.clone());
                }
            }
            Self::Wip => {
                frame.insert("id".into(), json!(seq));
                frame.insert("method".into(), json!(command.name().as_str()));
                if let Some(params) = command.params() {
                    frame.insert("params".into(), params.clone());
                }
            }
        }
        serde_json::to_string(&Value::Object(frame))
    }

    pub fn classify(self, binder: &Binder, raw: Value) -> Result<Incoming, FrameError> {
        let envelope = self.envelope_type();
        let schema = binder
            .describe(envelope)
            .ok_or(FrameError::MissingEnvelope(envelope))?;
        let resolved = binder.resolve(raw, schema, BindMode::Eager)?;
        let view = resolved.view();
        match self {
            Self::V8 if resolved.is(schema::V8_RESPONSE) => v8_response(view),
            Self::Wip if resolved.is(schema::WIP_RESPONSE) => wip_response(view),
            Self::V8 => Ok(Incoming::Event(EventFrame {
                name: text(view, "event")?,
                body: payload(view, "body")?,
            })),
            Self::Wip => Ok(Incoming::Event(EventFrame {
                name: text(view, "method")?,
                body: payload(view, "params")?,
            })),
        }
    }

    /// Sequence id a response frame answers, read without binding the envelope.
    #[must_use]
    pub fn response_seq(self, raw: &Value) -> Option<u64> {
        let object = raw.as_object()?;
        match self {
            Self::V8 => {
                object
                    .get("type")
                    .and_then(Value::as_str)
                    .filter(|kind| kind.eq_ignore_ascii_case("response"))?;
                object.get("request_seq")?.as_u64()
            }
            Self::Wip => object.get("id")?.as_u64(),
        }
    }

    #[must_use]
    pub fn event_lifecycle(self, name: &str) -> Option<Lifecycle> {
        match (self, name) {
            (Self::V8, "break" | "exception") | (Self::Wip, "Debugger.paused") => {
                Some(Lifecycle::Suspend)
            }
            (Self::Wip, "Debugger.resumed") => Some(Lifecycle::Resume),
            _ => None,
        }
    }

    #[must_use]
    pub fn response_lifecycle(self, frame: &ResponseFrame) -> Option<Lifecycle> {
        match (self, frame.running) {
            (Self::V8, Some(true)) => Some(Lifecycle::Resume),
            _ => None,
        }
    }
}

fn v8_response(view: &BoundView) -> Result<Incoming, FrameError> {
    let seq = sequence(view.long("requestSeq")?.unwrap_or_default())?;
    let outcome = if view.boolean("success")?.unwrap_or(false) {
        Ok(payload(view, "body")?)
    } else {
        Err(RemoteError {
            code: None,
            message: view
                .string("message")?
                .map_or_else(|| SmolStr::new_static("command failed"), SmolStr::new),
        })
    };
    let refs = match view.list("refs")? {
        Some(refs) => refs
            .iter()
            .filter_map(FieldValue::as_record)
            .map(|entry| {
                let handle = entry.long("handle")?.unwrap_or_default();
                Ok((handle, Arc::clone(entry.raw())))
            })
            .collect::<Result<Vec<_>, FrameError>>()?,
        None => Vec::new(),
    };
    Ok(Incoming::Response(ResponseFrame {
        seq,
        outcome,
        refs,
        running: view.boolean("running")?,
    }))
}

fn wip_response(view: &BoundView) -> Result<Incoming, FrameError> {
    let seq = sequence(view.long("id")?.unwrap_or_default())?;
    let outcome = match view.record("error")? {
        Some(error) => Err(RemoteError {
            code: error.long("code")?,
            message: SmolStr::new(error.string("message")?.unwrap_or_default()),
        }),
        None => Ok(payload(view, "result")?),
    };
    Ok(Incoming::Response(ResponseFrame {
        seq,
        outcome,
        refs: Vec::new(),
        running: None,
    }))
}

fn sequence(value: i64) -> Result<u64, FrameError> {
    u64::try_from(value).map_err(|_| FrameError::InvalidSeq(value))
}

fn text(view: &BoundView, field: &str) -> Result<SmolStr, FrameError> {
    Ok(SmolStr::new(view.string(field)?.unwrap_or_default()))
}

/// Opaque payload field; absent and `null` both read as `null`.
fn payload(view: &BoundView, field: &str) -> Result<Value, FrameError> {
    Ok(view.any(field)?.cloned().unwrap_or(Value::Null))
}
