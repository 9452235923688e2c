//! Typed views over loosely structured debug protocol JSON.
//!
//! Records are declared once in a [`SchemaRegistry`]; a [`Binder`] then turns
//! raw `serde_json::Value`s into [`BoundView`]s (eager or lazy) and narrows
//! untagged polymorphic values to one registered candidate ([`ResolvedView`]).

mod descriptor;
mod error;
mod registry;
mod resolve;
mod value;
mod view;

pub use descriptor::{
    BindMode, FieldDescriptor, SchemaDescriptor, SubtypeCandidate, SubtypeCondition,
    SubtypeRelation, SubtypeRule, TypeId, ValueKind, OPAQUE_TYPE,
};
pub use error::{
    BindingError, BindingProblem, CandidateMismatch, ResolutionError, SchemaConfigurationError,
};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
pub use resolve::ResolvedView;
pub use value::FieldValue;
pub use view::{AmbiguityPolicy, Binder, BoundView};
