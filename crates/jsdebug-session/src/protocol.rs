//! Outgoing commands.
//! - OutgoingCommand: name, parameters, expected result schema
//! - typed argument records for V8 and WebInspector commands

use jsdebug_protocol::TypeId;
use serde::Serialize;
use serde_json::Value;
use smol_str::SmolStr;

use crate::schema;

/// A command ready to be stamped with a sequence id.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCommand {
    name: SmolStr,
    params: Option<Value>,
    result_type: Option<TypeId>,
}

impl OutgoingCommand {
    #[must_use]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            params: None,
            result_type: None,
        }
    }

    /// Builds a command from a typed argument record.
    pub fn from_arguments<A: CommandArguments>(arguments: &A) -> Result<Self, serde_json::Error> {
        let command = Self::new(A::COMMAND).with_params(arguments)?;
        Ok(match A::RESULT {
            Some(result) => command.expecting(result),
            None => command,
        })
    }

    pub fn with_params<T: Serialize + ?Sized>(
        mut self,
        params: &T,
    ) -> Result<Self, serde_json::Error> {
        self.params = Some(serde_json::to_value(params)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_raw_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Binds the response body against `type_id` before it reaches the callback.
    #[must_use]
    pub fn expecting(mut self, type_id: impl Into<TypeId>) -> Self {
        self.result_type = Some(type_id.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> Option<&Value> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn result_type(&self) -> Option<&TypeId> {
        self.result_type.as_ref()
    }
}

/// Argument record of one protocol command.
pub trait CommandArguments: Serialize {
    const COMMAND: &'static str;
    /// Schema of the response body, when known.
    const RESULT: Option<&'static str>;
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktraceArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_refs: Option<bool>,
}

impl CommandArguments for BacktraceArguments {
    const COMMAND: &'static str = "backtrace";
    const RESULT: Option<&'static str> = Some(schema::V8_BACKTRACE_BODY);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeArguments {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_number: Option<u32>,
}

impl CommandArguments for ScopeArguments {
    const COMMAND: &'static str = "scope";
    const RESULT: Option<&'static str> = None;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupArguments {
    pub handles: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_source: Option<bool>,
}

impl CommandArguments for LookupArguments {
    const COMMAND: &'static str = "lookup";
    const RESULT: Option<&'static str> = None;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateArguments {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_break: Option<bool>,
}

impl CommandArguments for EvaluateArguments {
    const COMMAND: &'static str = "evaluate";
    const RESULT: Option<&'static str> = Some(schema::V8_VALUE);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    In,
    Next,
    Out,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContinueArguments {
    #[serde(rename = "stepaction", skip_serializing_if = "Option::is_none")]
    pub step_action: Option<StepAction>,
    #[serde(rename = "stepcount", skip_serializing_if = "Option::is_none")]
    pub step_count: Option<u32>,
}

impl CommandArguments for ContinueArguments {
    const COMMAND: &'static str = "continue";
    const RESULT: Option<&'static str> = None;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameArguments {
    pub call_frame_id: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}

impl CommandArguments for EvaluateOnCallFrameArguments {
    const COMMAND: &'static str = "Debugger.evaluateOnCallFrame";
    const RESULT: Option<&'static str> = Some(schema::WIP_EVALUATE_RESULT);
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvaluateArguments {
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_by_value: Option<bool>,
}

impl CommandArguments for RuntimeEvaluateArguments {
    const COMMAND: &'static str = "Runtime.evaluate";
    const RESULT: Option<&'static str> = Some(schema::WIP_EVALUATE_RESULT);
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResumeArguments {}

impl CommandArguments for ResumeArguments {
    const COMMAND: &'static str = "Debugger.resume";
    const RESULT: Option<&'static str> = None;
}
