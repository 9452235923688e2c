//! Value binder + bound views.
//! - Binder: binds raw JSON against registered schemas
//! - BoundView: typed, immutable view with one memoized slot per field
//! - field coercions (long/double/string/enum/record/list/subtype)

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::{BindMode, SchemaDescriptor, TypeId, ValueKind};
use crate::error::{BindingError, BindingProblem};
use crate::registry::SchemaRegistry;
use crate::resolve::ResolvedView;
use crate::value::{json_type_name, FieldValue};

/// What structural resolution does when several candidates bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Report a resolution error.
    #[default]
    Reject,
    /// Warn and use the first candidate in declaration order.
    FirstMatch,
}

/// Binds raw JSON values against the schemas of one registry.
#[derive(Debug, Clone)]
pub struct Binder {
    registry: Arc<SchemaRegistry>,
    ambiguity: AmbiguityPolicy,
}

impl Binder {
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            ambiguity: AmbiguityPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn ambiguity(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    #[must_use]
    pub fn describe(&self, id: &str) -> Option<&Arc<SchemaDescriptor>> {
        self.registry.describe(id)
    }

    pub fn bind(
        &self,
        raw: impl Into<Arc<Value>>,
        schema: &Arc<SchemaDescriptor>,
        mode: BindMode,
    ) -> Result<BoundView, BindingError> {
        match mode {
            BindMode::Eager => self.bind_eager(raw, schema),
            BindMode::Lazy => Ok(self.bind_lazy(raw, schema)),
        }
    }

    /// Looks the schema up by id, then binds.
    pub fn bind_type(
        &self,
        raw: impl Into<Arc<Value>>,
        type_id: &str,
        mode: BindMode,
    ) -> Result<BoundView, BindingError> {
        let Some(schema) = self.registry.describe(type_id) else {
            let type_id = TypeId::new(type_id);
            return Err(BindingError::new(
                &type_id,
                BindingError::ROOT,
                format!("record {type_id}"),
                BindingProblem::UnknownType,
            ));
        };
        self.bind(raw, schema, mode)
    }

    /// Validates every declared field up front.
    pub fn bind_eager(
        &self,
        raw: impl Into<Arc<Value>>,
        schema: &Arc<SchemaDescriptor>,
    ) -> Result<BoundView, BindingError> {
        let view = self.view(raw.into(), schema, BindMode::Eager);
        if !view.raw().is_object() {
            return Err(BindingError::new(
                &schema.id,
                BindingError::ROOT,
                format!("record {}", schema.id),
                BindingProblem::NotAnObject {
                    found: json_type_name(view.raw()),
                },
            ));
        }
        view.bind_all()?;
        Ok(view)
    }

    /// Defers validation of each field to its first access.
    #[must_use]
    pub fn bind_lazy(
        &self,
        raw: impl Into<Arc<Value>>,
        schema: &Arc<SchemaDescriptor>,
    ) -> BoundView {
        self.view(raw.into(), schema, BindMode::Lazy)
    }

    fn view(&self, raw: Arc<Value>, schema: &Arc<SchemaDescriptor>, mode: BindMode) -> BoundView {
        let slots = schema.fields.iter().map(|_| OnceCell::new()).collect();
        BoundView {
            inner: Arc::new(ViewInner {
                binder: self.clone(),
                schema: Arc::clone(schema),
                raw,
                mode,
                slots,
            }),
        }
    }

    fn bind_field(
        &self,
        schema: &SchemaDescriptor,
        raw: &Value,
        index: usize,
        mode: BindMode,
    ) -> Result<FieldValue, BindingError> {
        let field = &schema.fields[index];
        let error =
            |problem| BindingError::new(&schema.id, field.name.clone(), &field.kind, problem);
        let Some(object) = raw.as_object() else {
            return Err(error(BindingProblem::NotAnObject {
                found: json_type_name(raw),
            }));
        };
        let value = match object.get(field.wire_name.as_str()) {
            None if field.optional => return Ok(FieldValue::Unset),
            None => return Err(error(BindingProblem::Missing)),
            Some(Value::Null) if field.nullable => return Ok(FieldValue::Null),
            Some(Value::Null) => return Err(error(BindingProblem::UnexpectedNull)),
            Some(value) => value,
        };
        self.coerce(&field.kind, value, field.mode.unwrap_or(mode))
            .map_err(error)
    }

    fn coerce(
        &self,
        kind: &ValueKind,
        value: &Value,
        mode: BindMode,
    ) -> Result<FieldValue, BindingProblem> {
        let mistyped = || BindingProblem::Mistyped {
            found: json_type_name(value),
        };
        match kind {
            ValueKind::Bool => value.as_bool().map(FieldValue::Bool).ok_or_else(mistyped),
            ValueKind::Long => integral(value).map(FieldValue::Long).ok_or_else(mistyped),
            ValueKind::Double => value.as_f64().map(FieldValue::Double).ok_or_else(mistyped),
            ValueKind::String => value
                .as_str()
                .map(|text| FieldValue::String(text.to_owned()))
                .ok_or_else(mistyped),
            ValueKind::Any => Ok(FieldValue::Any(value.clone())),
            ValueKind::Enum(constants) => {
                let text = value.as_str().ok_or_else(mistyped)?;
                constants
                    .iter()
                    .find(|constant| constant.eq_ignore_ascii_case(text))
                    .map(|constant| FieldValue::Enum(constant.clone()))
                    .ok_or_else(|| BindingProblem::UnknownEnumValue(text.into()))
            }
            ValueKind::Record(id) => {
                let schema = self
                    .registry
                    .describe(id.as_str())
                    .ok_or(BindingProblem::UnknownType)?;
                match mode {
                    BindMode::Eager => self
                        .bind_eager(value.clone(), schema)
                        .map(FieldValue::Record)
                        .map_err(|err| BindingProblem::Nested(Box::new(err))),
                    BindMode::Lazy if value.is_object() => {
                        Ok(FieldValue::Record(self.bind_lazy(value.clone(), schema)))
                    }
                    BindMode::Lazy => Err(mistyped()),
                }
            }
            ValueKind::Polymorphic(id) => {
                let schema = self
                    .registry
                    .describe(id.as_str())
                    .ok_or(BindingProblem::UnknownType)?;
                self.resolve(value.clone(), schema, mode)
                    .map(FieldValue::Variant)
                    .map_err(|err| BindingProblem::Resolution(Box::new(err)))
            }
            ValueKind::List(element) => {
                let items = value.as_array().ok_or_else(mistyped)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        self.coerce(element, item, mode)
                            .map_err(|problem| BindingProblem::Element {
                                index,
                                problem: Box::new(problem),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(FieldValue::List)
            }
        }
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn integral(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(value) = number.as_i64() {
        return Some(value);
    }
    let value = number.as_f64()?;
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Typed view over one raw JSON record.
///
/// The view never mutates its raw value. Each declared field owns one slot
/// that is filled at most once: at construction for eager views, on first
/// access for lazy ones. Failures are cached like successes.
#[derive(Clone)]
pub struct BoundView {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    binder: Binder,
    schema: Arc<SchemaDescriptor>,
    raw: Arc<Value>,
    mode: BindMode,
    slots: Box<[OnceCell<Result<FieldValue, BindingError>>]>,
}

impl BoundView {
    #[must_use]
    pub fn type_id(&self) -> &TypeId {
        &self.inner.schema.id
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.inner.schema
    }

    #[must_use]
    pub fn raw(&self) -> &Arc<Value> {
        &self.inner.raw
    }

    #[must_use]
    pub fn mode(&self) -> BindMode {
        self.inner.mode
    }

    pub(crate) fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    /// Decoded value of a declared field, by logical name.
    pub fn field(&self, name: &str) -> Result<&FieldValue, BindingError> {
        let Some(index) = self.inner.schema.field_index(name) else {
            return Err(BindingError::new(
                self.type_id(),
                name,
                "declared field",
                BindingProblem::NotDeclared,
            ));
        };
        self.field_at(index)
    }

    /// Decoded value of the field at `index` in declaration order.
    pub fn field_at(&self, index: usize) -> Result<&FieldValue, BindingError> {
        let inner = &*self.inner;
        let Some(slot) = inner.slots.get(index) else {
            return Err(BindingError::new(
                self.type_id(),
                format!("#{index}"),
                "declared field",
                BindingProblem::NotDeclared,
            ));
        };
        let slot = slot.get_or_init(|| {
            inner
                .binder
                .bind_field(&inner.schema, &inner.raw, index, inner.mode)
        });
        slot.as_ref().map_err(Clone::clone)
    }

    /// Whether the field's slot has been filled.
    #[must_use]
    pub fn is_decoded(&self, name: &str) -> bool {
        self.inner
            .schema
            .field_index(name)
            .is_some_and(|index| self.inner.slots[index].get().is_some())
    }

    /// Decodes every declared field and checks closed records for extra properties.
    pub fn bind_all(&self) -> Result<(), BindingError> {
        for index in 0..self.inner.slots.len() {
            self.field_at(index)?;
        }
        let schema = &self.inner.schema;
        if schema.allows_other_properties {
            return Ok(());
        }
        if let Some(object) = self.inner.raw.as_object() {
            let undeclared = object.keys().find(|key| {
                !schema
                    .fields
                    .iter()
                    .any(|field| field.wire_name == key.as_str())
            });
            if let Some(key) = undeclared {
                return Err(BindingError::new(
                    &schema.id,
                    key.as_str(),
                    "closed record",
                    BindingProblem::UndeclaredProperty,
                ));
            }
        }
        Ok(())
    }

    pub fn boolean(&self, name: &str) -> Result<Option<bool>, BindingError> {
        Ok(self.field(name)?.as_bool())
    }

    pub fn long(&self, name: &str) -> Result<Option<i64>, BindingError> {
        Ok(self.field(name)?.as_long())
    }

    pub fn double(&self, name: &str) -> Result<Option<f64>, BindingError> {
        Ok(self.field(name)?.as_double())
    }

    pub fn string(&self, name: &str) -> Result<Option<&str>, BindingError> {
        Ok(self.field(name)?.as_str())
    }

    pub fn any(&self, name: &str) -> Result<Option<&Value>, BindingError> {
        Ok(self.field(name)?.as_any())
    }

    pub fn record(&self, name: &str) -> Result<Option<&BoundView>, BindingError> {
        Ok(self.field(name)?.as_record())
    }

    pub fn variant(&self, name: &str) -> Result<Option<&ResolvedView>, BindingError> {
        Ok(self.field(name)?.as_variant())
    }

    pub fn list(&self, name: &str) -> Result<Option<&[FieldValue]>, BindingError> {
        Ok(self.field(name)?.as_list())
    }

    /// Deserializes the raw value into a concrete serde type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&*self.inner.raw)
    }
}

impl PartialEq for BoundView {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id() && self.raw() == other.raw()
    }
}

impl fmt::Debug for BoundView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundView")
            .field("type_id", self.type_id())
            .field("mode", &self.inner.mode)
            .field("raw", &self.inner.raw)
            .finish()
    }
}
