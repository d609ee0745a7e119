use serde_json::Value;
use std::collections::BTreeMap;

use super::spec::{NestedPopulate, PopulateSpec};
use crate::errors::EntityServiceError;
use crate::params::{allowed, join_path, Normalizer, ParamsBag};
use crate::schema::{AttributeDefinition, Cardinality};

/// One relation to populate, with its nested parameters normalized
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationStep {
    pub field: String,
    pub cardinality: Cardinality,
    pub target: PopulationTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopulationTarget {
    Relation {
        uid: String,
        params: ParamsBag,
    },
    /// Targets missing from `fragments` come back as bare `{id, __type}` references
    Morph {
        fragments: BTreeMap<String, ParamsBag>,
    },
}

/// Turn a parsed populate spec into population steps for `uid`
pub(crate) fn resolve(
    normalizer: &Normalizer<'_>,
    uid: &str,
    spec: &PopulateSpec,
    path: &str,
) -> Result<Vec<PopulationStep>, EntityServiceError> {
    let schema = normalizer.registry().get(uid)?;
    let shallow = NestedPopulate::Params(Value::Null);

    let entries: Vec<(&str, &NestedPopulate)> = match spec {
        PopulateSpec::All => schema
            .relation_attributes()
            .map(|(name, _)| (name, &shallow))
            .collect(),
        PopulateSpec::Fields(names) => names.iter().map(|name| (name.as_str(), &shallow)).collect(),
        PopulateSpec::Nested(entries) => entries
            .iter()
            .map(|(name, nested)| (name.as_str(), nested))
            .collect(),
    };

    let mut steps: Vec<PopulationStep> = Vec::with_capacity(entries.len());
    for (field, nested) in entries {
        let field_path = join_path(path, field);
        if steps.iter().any(|step| step.field == field) {
            continue;
        }

        let definition = schema.attribute_def(field).ok_or_else(|| {
            EntityServiceError::invalid_populate(
                &field_path,
                format!("unknown attribute '{}' on {}", field, schema.uid),
            )
        })?;

        let step = match definition {
            AttributeDefinition::Scalar { .. } => {
                return Err(EntityServiceError::invalid_populate(
                    field_path,
                    format!("'{}' is not a relation", field),
                ))
            }
            AttributeDefinition::Relation {
                target,
                cardinality,
            } => {
                let NestedPopulate::Params(raw) = nested else {
                    return Err(EntityServiceError::invalid_populate(
                        field_path,
                        "'on' fragments only apply to polymorphic relations",
                    ));
                };
                PopulationStep {
                    field: field.to_string(),
                    cardinality: *cardinality,
                    target: PopulationTarget::Relation {
                        uid: target.clone(),
                        params: normalizer.normalize_at(
                            target,
                            allowed::NESTED_POPULATE,
                            raw,
                            &field_path,
                        )?,
                    },
                }
            }
            AttributeDefinition::MorphRelation {
                targets,
                cardinality,
            } => {
                let mut fragments = BTreeMap::new();
                match nested {
                    NestedPopulate::Params(raw) => {
                        for target in targets {
                            let params = normalizer.normalize_at(
                                target,
                                allowed::NESTED_POPULATE,
                                raw,
                                &field_path,
                            )?;
                            fragments.insert(target.clone(), params);
                        }
                    }
                    NestedPopulate::Fragments(list) => {
                        for (target, raw) in list {
                            let fragment_path = join_path(&join_path(&field_path, "on"), target);
                            if !targets.contains(target) {
                                return Err(EntityServiceError::invalid_populate(
                                    fragment_path,
                                    format!("'{}' is not a target of '{}'", target, field),
                                ));
                            }
                            let params = normalizer.normalize_at(
                                target,
                                allowed::NESTED_POPULATE,
                                raw,
                                &fragment_path,
                            )?;
                            fragments.insert(target.clone(), params);
                        }
                    }
                }
                PopulationStep {
                    field: field.to_string(),
                    cardinality: *cardinality,
                    target: PopulationTarget::Morph { fragments },
                }
            }
        };
        steps.push(step);
    }

    Ok(steps)
}
