//! Built-in schemas for both wire dialects.
//! - envelopes: classify a frame as response or event
//! - bodies: payloads of the commands and events this crate knows about

use jsdebug_protocol::{
    FieldDescriptor as Field, SchemaConfigurationError, SchemaDescriptor as Schema,
    SchemaRegistryBuilder, SubtypeCandidate as Candidate, SubtypeCondition as Condition,
    ValueKind as Kind,
};

pub const V8_INCOMING: &str = "V8Incoming";
pub const V8_RESPONSE: &str = "V8Response";
pub const V8_EVENT: &str = "V8Event";
pub const V8_REF: &str = "V8Ref";
pub const V8_BREAK_BODY: &str = "V8BreakBody";
pub const V8_SCRIPT_REF: &str = "V8ScriptRef";
pub const V8_BACKTRACE_BODY: &str = "V8BacktraceBody";
pub const V8_FRAME: &str = "V8Frame";
pub const V8_VALUE: &str = "V8Value";
pub const V8_OBJECT_VALUE: &str = "V8ObjectValue";
pub const V8_SCALAR_VALUE: &str = "V8ScalarValue";
pub const V8_SPECIAL_VALUE: &str = "V8SpecialValue";

pub const WIP_INCOMING: &str = "WipIncoming";
pub const WIP_RESPONSE: &str = "WipResponse";
pub const WIP_EVENT: &str = "WipEvent";
pub const WIP_ERROR: &str = "WipError";
pub const WIP_PAUSED_PARAMS: &str = "WipPausedParams";
pub const WIP_CALL_FRAME: &str = "WipCallFrame";
pub const WIP_LOCATION: &str = "WipLocation";
pub const WIP_SCRIPT_PARSED: &str = "WipScriptParsed";
pub const WIP_EVALUATE_RESULT: &str = "WipEvaluateResult";
pub const WIP_REMOTE_OBJECT: &str = "WipRemoteObject";

/// A registry builder preloaded with every built-in schema.
pub fn protocol_registry_builder() -> Result<SchemaRegistryBuilder, SchemaConfigurationError> {
    let mut builder = SchemaRegistryBuilder::new();
    builder.register_all(v8_schemas())?;
    builder.register_all(wip_schemas())?;
    Ok(builder)
}

fn v8_schemas() -> Vec<Schema> {
    vec![
        Schema::record(V8_INCOMING).discriminated(vec![
            Candidate::new(V8_RESPONSE).when(Condition::string_value("type", "response")),
            Candidate::new(V8_EVENT).when(Condition::string_value("type", "event")),
        ]),
        Schema::record(V8_RESPONSE)
            .subtype_of(V8_INCOMING)
            .field(Field::optional("seq", Kind::Long))
            .field(Field::required("requestSeq", Kind::Long).wire_name("request_seq"))
            .field(Field::optional("command", Kind::String))
            .field(Field::required("success", Kind::Bool))
            .field(Field::optional("body", Kind::Any).nullable())
            .field(Field::optional("refs", Kind::list(Kind::record(V8_REF))))
            .field(Field::optional("running", Kind::Bool))
            .field(Field::optional("message", Kind::String)),
        Schema::record(V8_EVENT)
            .subtype_of(V8_INCOMING)
            .field(Field::optional("seq", Kind::Long))
            .field(Field::required("event", Kind::String))
            .field(Field::optional("body", Kind::Any).nullable()),
        Schema::record(V8_REF)
            .field(Field::required("handle", Kind::Long))
            .field(Field::optional("type", Kind::String)),
        Schema::record(V8_SCRIPT_REF)
            .field(Field::required("id", Kind::Long))
            .field(Field::optional("name", Kind::String).nullable())
            .field(Field::optional("lineOffset", Kind::Long))
            .field(Field::optional("columnOffset", Kind::Long)),
        Schema::record(V8_BREAK_BODY)
            .field(Field::optional("invocationText", Kind::String))
            .field(Field::optional("sourceLine", Kind::Long))
            .field(Field::optional("sourceColumn", Kind::Long))
            .field(Field::optional("sourceLineText", Kind::String))
            .field(Field::optional("script", Kind::record(V8_SCRIPT_REF)))
            .field(Field::optional("breakpoints", Kind::list(Kind::Long)))
            .field(Field::optional("uncaught", Kind::Bool))
            .field(Field::optional("exception", Kind::Any)),
        Schema::record(V8_FRAME)
            .field(Field::required("index", Kind::Long))
            .field(Field::optional("receiver", Kind::Any))
            .field(Field::optional("func", Kind::Any))
            .field(Field::optional("script", Kind::Any))
            .field(Field::required("line", Kind::Long))
            .field(Field::required("column", Kind::Long))
            .field(Field::optional("sourceLineText", Kind::String)),
        Schema::record(V8_BACKTRACE_BODY)
            .field(Field::optional("fromFrame", Kind::Long))
            .field(Field::optional("toFrame", Kind::Long))
            .field(Field::required("totalFrames", Kind::Long))
            .field(Field::optional("frames", Kind::list(Kind::record(V8_FRAME)))),
        Schema::record(V8_VALUE).discriminated(vec![
            Candidate::new(V8_OBJECT_VALUE).when(Condition::present("className")),
            Candidate::new(V8_SCALAR_VALUE)
                .when(Condition::absent("className"))
                .when(Condition::present("value")),
            Candidate::new(V8_SPECIAL_VALUE)
                .when(Condition::absent("className"))
                .when(Condition::absent("value")),
        ]),
        Schema::record(V8_OBJECT_VALUE)
            .subtype_of(V8_VALUE)
            .field(Field::optional("handle", Kind::Long))
            .field(Field::required("type", Kind::String))
            .field(Field::required("className", Kind::String))
            .field(Field::optional("properties", Kind::list(Kind::Any)))
            .field(Field::optional("text", Kind::String)),
        Schema::record(V8_SCALAR_VALUE)
            .subtype_of(V8_VALUE)
            .field(Field::optional("handle", Kind::Long))
            .field(Field::required("type", Kind::String))
            .field(Field::required("value", Kind::Any))
            .field(Field::optional("text", Kind::String)),
        Schema::record(V8_SPECIAL_VALUE)
            .subtype_of(V8_VALUE)
            .field(Field::optional("handle", Kind::Long))
            .field(Field::required(
                "type",
                Kind::enumeration(&["undefined", "null", "function", "frame", "script"]),
            ))
            .field(Field::optional("text", Kind::String)),
    ]
}

fn wip_schemas() -> Vec<Schema> {
    vec![
        Schema::record(WIP_INCOMING).discriminated(vec![
            Candidate::new(WIP_RESPONSE).when(Condition::present("id")),
            Candidate::new(WIP_EVENT)
                .when(Condition::absent("id"))
                .when(Condition::present("method")),
        ]),
        Schema::record(WIP_RESPONSE)
            .subtype_of(WIP_INCOMING)
            .field(Field::required("id", Kind::Long))
            .field(Field::optional("result", Kind::Any))
            .field(Field::optional("error", Kind::record(WIP_ERROR))),
        Schema::record(WIP_EVENT)
            .subtype_of(WIP_INCOMING)
            .field(Field::required("method", Kind::String))
            .field(Field::optional("params", Kind::Any)),
        Schema::record(WIP_ERROR)
            .field(Field::optional("code", Kind::Long))
            .field(Field::required("message", Kind::String))
            .field(Field::optional("data", Kind::Any)),
        Schema::record(WIP_LOCATION)
            .field(Field::required("scriptId", Kind::String))
            .field(Field::required("lineNumber", Kind::Long))
            .field(Field::optional("columnNumber", Kind::Long)),
        Schema::record(WIP_CALL_FRAME)
            .field(Field::required("callFrameId", Kind::String))
            .field(Field::required("functionName", Kind::String))
            .field(Field::required("location", Kind::record(WIP_LOCATION)))
            .field(Field::optional("scopeChain", Kind::list(Kind::Any)))
            .field(Field::optional("this", Kind::Any)),
        Schema::record(WIP_PAUSED_PARAMS)
            .field(Field::required("callFrames", Kind::list(Kind::record(WIP_CALL_FRAME))))
            .field(Field::required("reason", Kind::String))
            .field(Field::optional("data", Kind::Any))
            .field(Field::optional("hitBreakpoints", Kind::list(Kind::String))),
        Schema::record(WIP_SCRIPT_PARSED)
            .field(Field::required("scriptId", Kind::String))
            .field(Field::required("url", Kind::String))
            .field(Field::required("startLine", Kind::Long))
            .field(Field::required("startColumn", Kind::Long))
            .field(Field::required("endLine", Kind::Long))
            .field(Field::required("endColumn", Kind::Long))
            .field(Field::optional("sourceMapUrl", Kind::String).wire_name("sourceMapURL")),
        Schema::record(WIP_REMOTE_OBJECT)
            .field(Field::required(
                "type",
                Kind::enumeration(&[
                    "object",
                    "function",
                    "undefined",
                    "string",
                    "number",
                    "boolean",
                    "symbol",
                    "bigint",
                ]),
            ))
            .field(Field::optional("subtype", Kind::String))
            .field(Field::optional("className", Kind::String))
            .field(Field::optional("value", Kind::Any).nullable())
            .field(Field::optional("description", Kind::String))
            .field(Field::optional("objectId", Kind::String)),
        Schema::record(WIP_EVALUATE_RESULT)
            .field(Field::required("result", Kind::record(WIP_REMOTE_OBJECT)))
            .field(Field::optional("wasThrown", Kind::Bool))
            .field(Field::optional("exceptionDetails", Kind::Any)),
    ]
}
