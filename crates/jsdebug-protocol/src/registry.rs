//! Schema registry.
//! - SchemaRegistryBuilder: single-threaded registration + validation
//! - SchemaRegistry: read-only lookup shared across threads

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::descriptor::{SchemaDescriptor, SubtypeRule, TypeId};
use crate::error::SchemaConfigurationError;

/// Collects descriptors during startup.
#[derive(Debug)]
pub struct SchemaRegistryBuilder {
    schemas: IndexMap<TypeId, SchemaDescriptor>,
}

impl Default for SchemaRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistryBuilder {
    /// Creates a builder holding only the built-in opaque record.
    #[must_use]
    pub fn new() -> Self {
        let mut schemas = IndexMap::new();
        schemas.insert(TypeId::opaque(), SchemaDescriptor::record(TypeId::opaque()));
        Self { schemas }
    }

    pub fn register(
        &mut self,
        schema: SchemaDescriptor,
    ) -> Result<&mut Self, SchemaConfigurationError> {
        if self.schemas.contains_key(&schema.id) {
            return Err(SchemaConfigurationError::DuplicateType(schema.id));
        }
        self.schemas.insert(schema.id.clone(), schema);
        Ok(self)
    }

    pub fn register_all(
        &mut self,
        schemas: impl IntoIterator<Item = SchemaDescriptor>,
    ) -> Result<&mut Self, SchemaConfigurationError> {
        for schema in schemas {
            self.register(schema)?;
        }
        Ok(self)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.contains_key(id)
    }

    /// Validates cross references and freezes the registry.
    pub fn build(self) -> Result<SchemaRegistry, SchemaConfigurationError> {
        for schema in self.schemas.values() {
            self.validate(schema)?;
        }
        let schemas = self
            .schemas
            .into_iter()
            .map(|(id, schema)| (id, Arc::new(schema)))
            .collect();
        Ok(SchemaRegistry { schemas })
    }

    fn validate(&self, schema: &SchemaDescriptor) -> Result<(), SchemaConfigurationError> {
        for field in &schema.fields {
            let Some((target, polymorphic)) = field.kind.referenced_type() else {
                continue;
            };
            let Some(target_schema) = self.schemas.get(target) else {
                return Err(SchemaConfigurationError::UnknownFieldType {
                    owner: schema.id.clone(),
                    field: field.name.clone(),
                    target: target.clone(),
                });
            };
            if polymorphic && target_schema.subtypes.is_none() {
                return Err(SchemaConfigurationError::NotPolymorphic {
                    owner: schema.id.clone(),
                    field: field.name.clone(),
                    target: target.clone(),
                });
            }
        }

        if let Some(base) = &schema.base {
            let Some(base_schema) = self.schemas.get(base) else {
                return Err(SchemaConfigurationError::UnknownBase {
                    subtype: schema.id.clone(),
                    base: base.clone(),
                });
            };
            let listed = base_schema
                .subtypes
                .as_ref()
                .and_then(|relation| relation.position(schema.id.as_str()))
                .is_some();
            if !listed {
                return Err(SchemaConfigurationError::UnlistedSubtype {
                    subtype: schema.id.clone(),
                    base: base.clone(),
                });
            }
        }

        let Some(relation) = &schema.subtypes else {
            return Ok(());
        };
        if relation.candidates.is_empty() {
            return Err(SchemaConfigurationError::EmptyCandidates(schema.id.clone()));
        }
        for (index, candidate) in relation.candidates.iter().enumerate() {
            let Some(candidate_schema) = self.schemas.get(&candidate.subtype) else {
                return Err(SchemaConfigurationError::UnknownCandidate {
                    base: schema.id.clone(),
                    candidate: candidate.subtype.clone(),
                });
            };
            if candidate_schema.base.as_ref() != Some(&schema.id) {
                return Err(SchemaConfigurationError::CandidateBaseMismatch {
                    base: schema.id.clone(),
                    candidate: candidate.subtype.clone(),
                });
            }
            if relation.position(candidate.subtype.as_str()) != Some(index) {
                return Err(SchemaConfigurationError::DuplicateCandidate {
                    base: schema.id.clone(),
                    candidate: candidate.subtype.clone(),
                });
            }
            if relation.rule == SubtypeRule::Discriminated && candidate.conditions.is_empty() {
                return Err(SchemaConfigurationError::MissingCondition {
                    base: schema.id.clone(),
                    candidate: candidate.subtype.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Frozen schema table; safe for concurrent lookup.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: FxHashMap<TypeId, Arc<SchemaDescriptor>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new()
    }

    #[must_use]
    pub fn describe(&self, id: &str) -> Option<&Arc<SchemaDescriptor>> {
        self.schemas.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
