//! Declarative record schemas.
//! - TypeId: registry key for a record type
//! - ValueKind: declared kind of a field value
//! - FieldDescriptor / SchemaDescriptor: record layout
//! - SubtypeRelation: candidate sub-shapes of a polymorphic base

use std::borrow::Borrow;
use std::fmt;

use serde_json::{Map, Value};
use smol_str::SmolStr;

/// Name of the built-in record that accepts any JSON object.
pub const OPAQUE_TYPE: &str = "Opaque";

/// Registry key of a record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(SmolStr);

impl TypeId {
    #[must_use]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// The built-in record with no declared fields.
    #[must_use]
    pub fn opaque() -> Self {
        Self(SmolStr::new_static(OPAQUE_TYPE))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for TypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<SmolStr> for TypeId {
    fn from(value: SmolStr) -> Self {
        Self(value)
    }
}

impl Borrow<str> for TypeId {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// How a view validates and decodes its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindMode {
    /// Validate every field when the view is built.
    #[default]
    Eager,
    /// Validate each field on first access and cache the outcome.
    Lazy,
}

/// Declared kind of a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    /// Integral number; JSON numbers must have no fractional part.
    Long,
    Double,
    String,
    /// Any JSON value, kept as is.
    Any,
    /// String constant, matched case-insensitively.
    Enum(Vec<SmolStr>),
    Record(TypeId),
    /// Record narrowed to one of the subtypes registered for the base.
    Polymorphic(TypeId),
    List(Box<ValueKind>),
}

impl ValueKind {
    #[must_use]
    pub fn record(id: impl Into<TypeId>) -> Self {
        Self::Record(id.into())
    }

    #[must_use]
    pub fn polymorphic(id: impl Into<TypeId>) -> Self {
        Self::Polymorphic(id.into())
    }

    #[must_use]
    pub fn list(element: ValueKind) -> Self {
        Self::List(Box::new(element))
    }

    #[must_use]
    pub fn enumeration(values: &[&str]) -> Self {
        Self::Enum(values.iter().map(|value| SmolStr::new(value)).collect())
    }

    /// The record type this kind refers to, directly or through list elements.
    pub(crate) fn referenced_type(&self) -> Option<(&TypeId, bool)> {
        match self {
            Self::Record(id) => Some((id, false)),
            Self::Polymorphic(id) => Some((id, true)),
            Self::List(element) => element.referenced_type(),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("boolean"),
            Self::Long => f.write_str("long"),
            Self::Double => f.write_str("double"),
            Self::String => f.write_str("string"),
            Self::Any => f.write_str("any value"),
            Self::Enum(values) => {
                f.write_str("one of [")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(value)?;
                }
                f.write_str("]")
            }
            Self::Record(id) => write!(f, "record {id}"),
            Self::Polymorphic(id) => write!(f, "subtype of {id}"),
            Self::List(element) => write!(f, "list of {element}"),
        }
    }
}

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: SmolStr,
    pub wire_name: SmolStr,
    pub optional: bool,
    pub nullable: bool,
    pub kind: ValueKind,
    /// Overrides the binding mode inherited from the enclosing view.
    pub mode: Option<BindMode>,
}

impl FieldDescriptor {
    #[must_use]
    pub fn required(name: impl Into<SmolStr>, kind: ValueKind) -> Self {
        let name = name.into();
        Self {
            wire_name: name.clone(),
            name,
            optional: false,
            nullable: false,
            kind,
            mode: None,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<SmolStr>, kind: ValueKind) -> Self {
        Self {
            optional: true,
            ..Self::required(name, kind)
        }
    }

    /// Reads the field from a JSON property with a different name.
    #[must_use]
    pub fn wire_name(mut self, wire_name: impl Into<SmolStr>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: BindMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// A field test evaluated against the raw JSON object of a subtype candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtypeCondition {
    /// Boolean discriminator field holding the given value.
    BoolValue(SmolStr, bool),
    /// String field equal to the literal, ignoring ASCII case.
    StringValue(SmolStr, SmolStr),
    Present(SmolStr),
    Absent(SmolStr),
    /// Present and not `null`.
    NonNull(SmolStr),
}

impl SubtypeCondition {
    #[must_use]
    pub fn bool_value(field: impl Into<SmolStr>, expected: bool) -> Self {
        Self::BoolValue(field.into(), expected)
    }

    #[must_use]
    pub fn string_value(field: impl Into<SmolStr>, expected: impl Into<SmolStr>) -> Self {
        Self::StringValue(field.into(), expected.into())
    }

    #[must_use]
    pub fn present(field: impl Into<SmolStr>) -> Self {
        Self::Present(field.into())
    }

    #[must_use]
    pub fn absent(field: impl Into<SmolStr>) -> Self {
        Self::Absent(field.into())
    }

    #[must_use]
    pub fn non_null(field: impl Into<SmolStr>) -> Self {
        Self::NonNull(field.into())
    }

    #[must_use]
    pub fn field(&self) -> &SmolStr {
        match self {
            Self::BoolValue(field, _)
            | Self::StringValue(field, _)
            | Self::Present(field)
            | Self::Absent(field)
            | Self::NonNull(field) => field,
        }
    }

    /// Returns `None` when the condition holds, otherwise why it does not.
    pub(crate) fn check(&self, object: &Map<String, Value>) -> Option<SmolStr> {
        let value = object.get(self.field().as_str());
        match (self, value) {
            (Self::Absent(_), None) => None,
            (Self::Absent(_), Some(_)) => Some(SmolStr::new_static("expected absent")),
            (_, None) => Some(SmolStr::new_static("missing")),
            (Self::Present(_), Some(_)) => None,
            (Self::NonNull(_), Some(Value::Null)) => Some(SmolStr::new_static("expected non-null")),
            (Self::NonNull(_), Some(_)) => None,
            (Self::BoolValue(_, expected), Some(value)) => match value.as_bool() {
                Some(actual) if actual == *expected => None,
                _ => Some(SmolStr::new(format!("expected {expected}"))),
            },
            (Self::StringValue(_, expected), Some(value)) => match value.as_str() {
                Some(actual) if actual.eq_ignore_ascii_case(expected) => None,
                _ => Some(SmolStr::new(format!("expected '{expected}'"))),
            },
        }
    }
}

/// How a polymorphic base picks among its candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtypeRule {
    /// Each candidate declares conditions; exactly one candidate may satisfy them.
    Discriminated,
    /// Each candidate is bound eagerly in order; the candidate that binds wins.
    Structural,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeCandidate {
    pub subtype: TypeId,
    pub conditions: Vec<SubtypeCondition>,
}

impl SubtypeCandidate {
    #[must_use]
    pub fn new(subtype: impl Into<TypeId>) -> Self {
        Self {
            subtype: subtype.into(),
            conditions: Vec::new(),
        }
    }

    #[must_use]
    pub fn when(mut self, condition: SubtypeCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Candidate sub-shapes of a polymorphic base, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtypeRelation {
    pub rule: SubtypeRule,
    pub candidates: Vec<SubtypeCandidate>,
}

impl SubtypeRelation {
    #[must_use]
    pub fn position(&self, subtype: &str) -> Option<usize> {
        self.candidates
            .iter()
            .position(|candidate| candidate.subtype.as_str() == subtype)
    }
}

/// Layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub id: TypeId,
    pub fields: Vec<FieldDescriptor>,
    pub allows_other_properties: bool,
    /// Polymorphic base this record narrows.
    pub base: Option<TypeId>,
    /// Present when this record is itself a polymorphic base.
    pub subtypes: Option<SubtypeRelation>,
}

impl SchemaDescriptor {
    #[must_use]
    pub fn record(id: impl Into<TypeId>) -> Self {
        Self {
            id: id.into(),
            fields: Vec::new(),
            allows_other_properties: true,
            base: None,
            subtypes: None,
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Rejects JSON properties that no field declares.
    #[must_use]
    pub fn closed(mut self) -> Self {
        self.allows_other_properties = false;
        self
    }

    #[must_use]
    pub fn subtype_of(mut self, base: impl Into<TypeId>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn discriminated(mut self, candidates: Vec<SubtypeCandidate>) -> Self {
        self.subtypes = Some(SubtypeRelation {
            rule: SubtypeRule::Discriminated,
            candidates,
        });
        self
    }

    #[must_use]
    pub fn structural(mut self, candidates: &[&str]) -> Self {
        self.subtypes = Some(SubtypeRelation {
            rule: SubtypeRule::Structural,
            candidates: candidates
                .iter()
                .map(|candidate| SubtypeCandidate::new(*candidate))
                .collect(),
        });
        self
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Logical name of the first required field whose wire name is absent from `object`.
    pub(crate) fn first_missing_required(&self, object: &Map<String, Value>) -> Option<&SmolStr> {
        self.fields
            .iter()
            .find(|field| !field.optional && !object.contains_key(field.wire_name.as_str()))
            .map(|field| &field.name)
    }
}
