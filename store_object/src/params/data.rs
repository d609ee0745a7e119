//! Validation of entity `data` for create and update

use serde_json::{json, Map, Value};
use type_mapping::{coerce_value, AttributeType, EntityId};

use super::join_path;
use crate::errors::EntityServiceError;
use crate::schema::{AttributeDefinition, Cardinality, ContentTypeSchema, ScalarConstraints};

/// Attribute values ready for the storage engine.
///
/// Scalars hold their canonical JSON form. Relations hold the related id
/// (or `null`), an array of ids, or `{"__type", "id"}` references for
/// polymorphic relations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityData {
    values: Map<String, Value>,
}

impl EntityData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap values that are already in storage form
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: Value) {
        self.values.insert(attribute.into(), value);
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.values.contains_key(attribute)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

pub(crate) fn parse_data(
    schema: &ContentTypeSchema,
    raw: &Value,
    path: &str,
) -> Result<EntityData, EntityServiceError> {
    let map = match raw {
        Value::Null => return Ok(EntityData::new()),
        Value::Object(map) => map,
        _ => {
            return Err(EntityServiceError::invalid_parameter(
                path,
                "data must be an object",
            ))
        }
    };

    let mut data = EntityData::new();
    for (name, value) in map {
        let attr_path = join_path(path, name);
        if name == "id" {
            return Err(EntityServiceError::invalid_parameter(
                attr_path,
                "the identifier is assigned by the storage engine",
            ));
        }
        let definition = schema.attribute_def(name).ok_or_else(|| {
            EntityServiceError::invalid_parameter(
                &attr_path,
                format!("unknown attribute '{}' on {}", name, schema.uid),
            )
        })?;

        let normalized = match definition {
            AttributeDefinition::Scalar { ty, constraints } => {
                scalar_value(*ty, constraints, value, &attr_path)?
            }
            AttributeDefinition::Relation { cardinality, .. } => {
                relation_value(*cardinality, value, &attr_path)?
            }
            AttributeDefinition::MorphRelation {
                targets,
                cardinality,
            } => morph_value(*cardinality, value, &attr_path, |uid| targets.contains(uid))?,
        };
        data.insert(name.clone(), normalized);
    }
    Ok(data)
}

/// Every required scalar must be present and non-null
pub(crate) fn check_required(
    schema: &ContentTypeSchema,
    data: &EntityData,
    path: &str,
) -> Result<(), EntityServiceError> {
    for (name, definition) in schema.scalar_attributes() {
        let required = definition.constraints().is_some_and(|c| c.required);
        if required && data.get(name).map_or(true, Value::is_null) {
            return Err(EntityServiceError::invalid_parameter(
                join_path(path, name),
                "attribute is required",
            ));
        }
    }
    Ok(())
}

/// Required scalars present in an update must not be set to null
pub(crate) fn check_not_nulled(
    schema: &ContentTypeSchema,
    data: &EntityData,
    path: &str,
) -> Result<(), EntityServiceError> {
    for (name, value) in data.iter() {
        let required = schema
            .attribute_def(name)
            .and_then(AttributeDefinition::constraints)
            .is_some_and(|c| c.required);
        if required && value.is_null() {
            return Err(EntityServiceError::invalid_parameter(
                join_path(path, name),
                "attribute is required",
            ));
        }
    }
    Ok(())
}

fn scalar_value(
    ty: AttributeType,
    constraints: &ScalarConstraints,
    value: &Value,
    path: &str,
) -> Result<Value, EntityServiceError> {
    let coerced =
        coerce_value(ty, value).map_err(|e| EntityServiceError::invalid_parameter(path, e.to_string()))?;

    let Some(text) = coerced.as_str() else {
        return Ok(coerced);
    };

    if let Some(allowed) = &constraints.enum_values {
        if !allowed.iter().any(|v| v == text) {
            return Err(EntityServiceError::invalid_parameter(
                path,
                format!("'{}' is not one of {:?}", text, allowed),
            ));
        }
    }

    let length = text.chars().count();
    if let Some(min) = constraints.min_length {
        if length < min {
            return Err(EntityServiceError::invalid_parameter(
                path,
                format!("must be at least {} characters", min),
            ));
        }
    }
    if let Some(max) = constraints.max_length {
        if length > max {
            return Err(EntityServiceError::invalid_parameter(
                path,
                format!("must be at most {} characters", max),
            ));
        }
    }

    if ty == AttributeType::Email && !looks_like_email(text) {
        return Err(EntityServiceError::invalid_parameter(path, "invalid email address"));
    }

    Ok(coerced)
}

fn looks_like_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() > 1
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

/// A related id given bare or as `{"id": ...}`
fn related_id(value: &Value, path: &str) -> Result<EntityId, EntityServiceError> {
    let raw_id = match value {
        Value::Object(map) => map.get("id").unwrap_or(&Value::Null),
        other => other,
    };
    EntityId::from_value(raw_id)
        .ok_or_else(|| EntityServiceError::invalid_parameter(path, "expected a related id"))
}

fn relation_value(
    cardinality: Cardinality,
    value: &Value,
    path: &str,
) -> Result<Value, EntityServiceError> {
    match (cardinality, value) {
        (Cardinality::One, Value::Null) => Ok(Value::Null),
        (Cardinality::One, Value::Array(_)) => Err(EntityServiceError::invalid_parameter(
            path,
            "to-one relations take a single id",
        )),
        (Cardinality::One, single) => related_id(single, path).map(|id| id.to_value()),
        (Cardinality::Many, Value::Null) => Ok(Value::Array(Vec::new())),
        (Cardinality::Many, Value::Array(items)) => {
            let mut ids: Vec<EntityId> = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let id = related_id(item, &join_path(path, &i.to_string()))?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(Value::Array(ids.iter().map(EntityId::to_value).collect()))
        }
        (Cardinality::Many, single) => {
            related_id(single, path).map(|id| Value::Array(vec![id.to_value()]))
        }
    }
}

fn morph_value(
    cardinality: Cardinality,
    value: &Value,
    path: &str,
    is_target: impl Fn(&str) -> bool,
) -> Result<Value, EntityServiceError> {
    let reference = |item: &Value, item_path: &str| -> Result<Value, EntityServiceError> {
        let map = item.as_object().ok_or_else(|| {
            EntityServiceError::invalid_parameter(item_path, "expected {\"__type\", \"id\"}")
        })?;
        let uid = map.get("__type").and_then(Value::as_str).ok_or_else(|| {
            EntityServiceError::invalid_parameter(item_path, "missing '__type'")
        })?;
        if !is_target(uid) {
            return Err(EntityServiceError::invalid_parameter(
                item_path,
                format!("'{}' is not a target of this relation", uid),
            ));
        }
        let id = related_id(item, item_path)?;
        Ok(json!({"__type": uid, "id": id.to_value()}))
    };

    match (cardinality, value) {
        (Cardinality::One, Value::Null) => Ok(Value::Null),
        (Cardinality::One, single) => reference(single, path),
        (Cardinality::Many, Value::Null) => Ok(Value::Array(Vec::new())),
        (Cardinality::Many, Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| reference(item, &join_path(path, &i.to_string())))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (Cardinality::Many, single) => reference(single, path).map(|r| Value::Array(vec![r])),
    }
}
