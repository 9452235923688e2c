//! Subtype resolution over untagged JSON.
//! - discriminated: candidate conditions, exactly one may hold
//! - structural: trial eager binding in declaration order
//! - ResolvedView: narrowed view + explicit subtype tag

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::descriptor::{
    BindMode, SchemaDescriptor, SubtypeCandidate, SubtypeRelation, SubtypeRule, TypeId,
};
use crate::error::{BindingError, BindingProblem, CandidateMismatch, ResolutionError};
use crate::value::json_type_name;
use crate::view::{AmbiguityPolicy, Binder, BoundView};

/// A raw value narrowed to one candidate of a polymorphic base.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedView {
    base: TypeId,
    subtype: TypeId,
    view: BoundView,
}

impl ResolvedView {
    #[must_use]
    pub fn base(&self) -> &TypeId {
        &self.base
    }

    /// Tag of the chosen candidate.
    #[must_use]
    pub fn subtype(&self) -> &TypeId {
        &self.subtype
    }

    #[must_use]
    pub fn is(&self, subtype: &str) -> bool {
        self.subtype.as_str() == subtype
    }

    #[must_use]
    pub fn view(&self) -> &BoundView {
        &self.view
    }

    #[must_use]
    pub fn into_view(self) -> BoundView {
        self.view
    }

    /// The raw value shared with the base-typed view.
    #[must_use]
    pub fn raw(&self) -> &Arc<Value> {
        self.view.raw()
    }

    /// Binds the same raw value as another candidate of the same base.
    pub fn reresolve_as(&self, sibling: &str) -> Result<ResolvedView, ResolutionError> {
        let binder = self.view.binder();
        let listed = binder
            .describe(self.base.as_str())
            .and_then(|base| base.subtypes.as_ref())
            .and_then(|relation| relation.position(sibling))
            .is_some();
        let schema = binder.describe(sibling).filter(|_| listed).ok_or_else(|| {
            ResolutionError::NotACandidate {
                base: self.base.clone(),
                subtype: TypeId::new(sibling),
            }
        })?;
        let view = binder
            .bind(Arc::clone(self.raw()), schema, self.view.mode())
            .map_err(ResolutionError::Binding)?;
        Ok(ResolvedView {
            base: self.base.clone(),
            subtype: schema.id.clone(),
            view,
        })
    }

    /// Resolves one level further when the chosen subtype is itself a base.
    pub fn narrow(&self) -> Result<ResolvedView, ResolutionError> {
        let binder = self.view.binder();
        binder.resolve(Arc::clone(self.raw()), self.view.schema(), self.view.mode())
    }
}

impl Binder {
    /// Narrows `raw` to the candidate of `base` it matches.
    pub fn resolve(
        &self,
        raw: impl Into<Arc<Value>>,
        base: &Arc<SchemaDescriptor>,
        mode: BindMode,
    ) -> Result<ResolvedView, ResolutionError> {
        let raw = raw.into();
        let Some(relation) = &base.subtypes else {
            return Err(ResolutionError::NotPolymorphic(base.id.clone()));
        };
        let Some(object) = raw.as_object() else {
            return Err(ResolutionError::Binding(BindingError::new(
                &base.id,
                BindingError::ROOT,
                format!("record {}", base.id),
                BindingProblem::NotAnObject {
                    found: json_type_name(&raw),
                },
            )));
        };
        let chosen = match relation.rule {
            SubtypeRule::Discriminated => self.discriminate(base, relation, object)?,
            SubtypeRule::Structural => {
                let view = self.bind_structural(base, relation, &raw)?;
                if mode == BindMode::Eager {
                    return Ok(ResolvedView {
                        base: base.id.clone(),
                        subtype: view.type_id().clone(),
                        view,
                    });
                }
                Arc::clone(view.schema())
            }
        };
        let view = self
            .bind(raw, &chosen, mode)
            .map_err(ResolutionError::Binding)?;
        Ok(ResolvedView {
            base: base.id.clone(),
            subtype: chosen.id.clone(),
            view,
        })
    }

    fn candidate_schema(
        &self,
        base: &SchemaDescriptor,
        candidate: &SubtypeCandidate,
    ) -> Result<&Arc<SchemaDescriptor>, ResolutionError> {
        self.describe(candidate.subtype.as_str())
            .ok_or_else(|| ResolutionError::NotACandidate {
                base: base.id.clone(),
                subtype: candidate.subtype.clone(),
            })
    }

    fn discriminate(
        &self,
        base: &SchemaDescriptor,
        relation: &SubtypeRelation,
        object: &Map<String, Value>,
    ) -> Result<Arc<SchemaDescriptor>, ResolutionError> {
        let mut mismatches = Vec::new();
        let mut matched = Vec::new();
        for candidate in &relation.candidates {
            let schema = self.candidate_schema(base, candidate)?;
            let failed = candidate.conditions.iter().find_map(|condition| {
                condition
                    .check(object)
                    .map(|reason| (condition.field().clone(), reason))
            });
            match failed {
                Some((field, reason)) => mismatches.push(CandidateMismatch {
                    candidate: schema.id.clone(),
                    field,
                    reason,
                }),
                None => matched.push(schema),
            }
        }

        if matched.len() > 1 {
            return Err(ResolutionError::Ambiguous {
                base: base.id.clone(),
                candidates: matched.iter().map(|schema| schema.id.clone()).collect(),
            });
        }
        let Some(schema) = matched.pop() else {
            return Err(ResolutionError::NoMatch {
                base: base.id.clone(),
                mismatches,
            });
        };
        if let Some(field) = schema.first_missing_required(object) {
            mismatches.push(CandidateMismatch {
                candidate: schema.id.clone(),
                field: field.clone(),
                reason: "missing".into(),
            });
            return Err(ResolutionError::NoMatch {
                base: base.id.clone(),
                mismatches,
            });
        }
        Ok(Arc::clone(schema))
    }

    fn bind_structural(
        &self,
        base: &SchemaDescriptor,
        relation: &SubtypeRelation,
        raw: &Arc<Value>,
    ) -> Result<BoundView, ResolutionError> {
        let mut mismatches = Vec::new();
        let mut bound = Vec::new();
        for candidate in &relation.candidates {
            let schema = self.candidate_schema(base, candidate)?;
            match self.bind_eager(Arc::clone(raw), schema) {
                Ok(view) => bound.push(view),
                Err(err) => mismatches.push(CandidateMismatch {
                    candidate: schema.id.clone(),
                    field: err.field,
                    reason: err.problem.to_string().into(),
                }),
            }
        }

        if bound.len() > 1 && self.ambiguity() == AmbiguityPolicy::Reject {
            return Err(ResolutionError::Ambiguous {
                base: base.id.clone(),
                candidates: bound.iter().map(|view| view.type_id().clone()).collect(),
            });
        }
        if bound.len() > 1 {
            warn!(
                base = %base.id,
                chosen = %bound[0].type_id(),
                matches = bound.len(),
                "ambiguous structural subtype, using first match"
            );
        }
        bound.into_iter().next().ok_or_else(|| ResolutionError::NoMatch {
            base: base.id.clone(),
            mismatches,
        })
    }
}
