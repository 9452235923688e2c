//! Decoded field values.

use serde_json::Value;
use smol_str::SmolStr;

use crate::resolve::ResolvedView;
use crate::view::BoundView;

/// A field decoded against its declared kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Optional field absent from the raw object.
    Unset,
    /// Nullable field holding JSON `null`.
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    /// Canonical constant of an enum field.
    Enum(SmolStr),
    Any(Value),
    Record(BoundView),
    Variant(ResolvedView),
    List(Vec<FieldValue>),
}

impl FieldValue {
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(value) => Some(*value),
            _ => None,
        }
    }

    /// Floating view of a numeric field; integral values widen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(value) => Some(*value),
            Self::Long(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            Self::Enum(value) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_any(&self) -> Option<&Value> {
        match self {
            Self::Any(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&BoundView> {
        match self {
            Self::Record(view) => Some(view),
            Self::Variant(resolved) => Some(resolved.view()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_variant(&self) -> Option<&ResolvedView> {
        match self {
            Self::Variant(resolved) => Some(resolved),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

/// JSON type name used in mismatch diagnostics.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.as_f64().is_some_and(|value| value.fract() != 0.0) => {
            "fractional number"
        }
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
