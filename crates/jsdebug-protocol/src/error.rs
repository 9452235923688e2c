//! Schema configuration, binding, and subtype resolution errors.

use std::fmt;

use smol_str::SmolStr;
use thiserror::Error;

use crate::descriptor::TypeId;

/// Startup-time registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaConfigurationError {
    #[error("type '{0}' is registered twice")]
    DuplicateType(TypeId),

    #[error("field '{field}' of '{owner}' references unregistered type '{target}'")]
    UnknownFieldType {
        owner: TypeId,
        field: SmolStr,
        target: TypeId,
    },

    #[error("field '{field}' of '{owner}' expects a subtype of '{target}', which declares no subtypes")]
    NotPolymorphic {
        owner: TypeId,
        field: SmolStr,
        target: TypeId,
    },

    #[error("subtype '{subtype}' references unregistered base '{base}'")]
    UnknownBase { subtype: TypeId, base: TypeId },

    #[error("subtype '{subtype}' is not listed as a candidate of '{base}'")]
    UnlistedSubtype { subtype: TypeId, base: TypeId },

    #[error("'{0}' declares an empty subtype candidate list")]
    EmptyCandidates(TypeId),

    #[error("candidate '{candidate}' of '{base}' is not registered")]
    UnknownCandidate { base: TypeId, candidate: TypeId },

    #[error("candidate '{candidate}' of '{base}' does not declare '{base}' as its base")]
    CandidateBaseMismatch { base: TypeId, candidate: TypeId },

    #[error("candidate '{candidate}' of '{base}' is listed twice")]
    DuplicateCandidate { base: TypeId, candidate: TypeId },

    #[error("discriminated candidate '{candidate}' of '{base}' declares no condition")]
    MissingCondition { base: TypeId, candidate: TypeId },
}

/// A field that could not be bound to its declared kind.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{type_id}.{field} ({expected}): {problem}")]
pub struct BindingError {
    pub type_id: TypeId,
    pub field: SmolStr,
    pub expected: SmolStr,
    pub problem: BindingProblem,
}

impl BindingError {
    pub(crate) fn new(
        type_id: &TypeId,
        field: impl Into<SmolStr>,
        expected: impl fmt::Display,
        problem: BindingProblem,
    ) -> Self {
        Self {
            type_id: type_id.clone(),
            field: field.into(),
            expected: SmolStr::new(expected.to_string()),
            problem,
        }
    }

    /// Field name used for errors about the record value itself.
    pub const ROOT: &'static str = "$";
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingProblem {
    #[error("missing")]
    Missing,

    #[error("found {found}")]
    Mistyped { found: &'static str },

    #[error("found null")]
    UnexpectedNull,

    #[error("unknown constant '{0}'")]
    UnknownEnumValue(SmolStr),

    #[error("enclosing value is {found}, not an object")]
    NotAnObject { found: &'static str },

    #[error("property is not declared")]
    UndeclaredProperty,

    #[error("no such field is declared")]
    NotDeclared,

    #[error("type is not registered")]
    UnknownType,

    #[error("element {index}: {problem}")]
    Element {
        index: usize,
        problem: Box<BindingProblem>,
    },

    #[error("{0}")]
    Nested(Box<BindingError>),

    #[error("{0}")]
    Resolution(Box<ResolutionError>),
}

/// Why one candidate was rejected during subtype resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateMismatch {
    pub candidate: TypeId,
    pub field: SmolStr,
    pub reason: SmolStr,
}

impl fmt::Display for CandidateMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}: {})", self.candidate, self.field, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("no subtype of '{base}' matches: {}", join(mismatches))]
    NoMatch {
        base: TypeId,
        mismatches: Vec<CandidateMismatch>,
    },

    #[error("ambiguous subtype of '{base}': {} all match", join(candidates))]
    Ambiguous {
        base: TypeId,
        candidates: Vec<TypeId>,
    },

    #[error("'{0}' declares no subtypes")]
    NotPolymorphic(TypeId),

    #[error("'{subtype}' is not a candidate of '{base}'")]
    NotACandidate { base: TypeId, subtype: TypeId },

    #[error(transparent)]
    Binding(BindingError),
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
