//! Sort parameter parsing
//!
//! Accepts `"title"`, `"title:desc,views"`, `["title:asc", {"author": {"name": "desc"}}]`
//! and `{"views": "desc"}`.

use serde_json::Value;

use super::join_path;
use crate::errors::EntityServiceError;
use crate::schema::{AttributeDefinition, ContentTypeSchema, SchemaRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(order: &str) -> Option<Self> {
        match order.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// One sort key, applied in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub path: Vec<String>,
    pub order: SortOrder,
}

impl SortEntry {
    pub fn new(path: &str, order: SortOrder) -> Self {
        Self {
            path: path.split('.').map(str::to_string).collect(),
            order,
        }
    }

    pub fn asc(path: &str) -> Self {
        Self::new(path, SortOrder::Asc)
    }

    pub fn desc(path: &str) -> Self {
        Self::new(path, SortOrder::Desc)
    }
}

pub(crate) fn parse_sort(
    registry: &SchemaRegistry,
    schema: &ContentTypeSchema,
    raw: &Value,
    path: &str,
) -> Result<Vec<SortEntry>, EntityServiceError> {
    let mut entries = Vec::new();
    collect(raw, &mut Vec::new(), path, &mut entries)?;

    for entry in &entries {
        check_path(registry, schema, &entry.path, path)?;
    }
    Ok(entries)
}

fn collect(
    raw: &Value,
    prefix: &mut Vec<String>,
    path: &str,
    entries: &mut Vec<SortEntry>,
) -> Result<(), EntityServiceError> {
    match raw {
        Value::Null => Ok(()),
        Value::String(s) => {
            for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let (field, order) = match part.split_once(':') {
                    Some((field, order)) => {
                        let order = SortOrder::parse(order).ok_or_else(|| {
                            EntityServiceError::invalid_parameter(
                                path,
                                format!("invalid sort order '{}'", order),
                            )
                        })?;
                        (field.trim(), order)
                    }
                    None => (part, SortOrder::Asc),
                };
                let mut entry_path = prefix.clone();
                entry_path.extend(field.split('.').map(str::to_string));
                entries.push(SortEntry {
                    path: entry_path,
                    order,
                });
            }
            Ok(())
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, prefix, &join_path(path, &i.to_string()), entries)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, value) in map {
                let key_path = join_path(path, key);
                prefix.push(key.clone());
                match value {
                    Value::String(order) => {
                        let order = SortOrder::parse(order).ok_or_else(|| {
                            EntityServiceError::invalid_parameter(
                                &key_path,
                                format!("invalid sort order '{}'", order),
                            )
                        })?;
                        entries.push(SortEntry {
                            path: prefix.clone(),
                            order,
                        });
                    }
                    Value::Object(_) => collect(value, prefix, &key_path, entries)?,
                    _ => {
                        return Err(EntityServiceError::invalid_parameter(
                            key_path,
                            "expected 'asc', 'desc' or a nested object",
                        ))
                    }
                }
                prefix.pop();
            }
            Ok(())
        }
        _ => Err(EntityServiceError::invalid_parameter(
            path,
            "sort must be a string, an array or an object",
        )),
    }
}

fn check_path(
    registry: &SchemaRegistry,
    schema: &ContentTypeSchema,
    segments: &[String],
    path: &str,
) -> Result<(), EntityServiceError> {
    let dotted = segments.join(".");
    let invalid = |message: &str| {
        EntityServiceError::invalid_parameter(path, format!("cannot sort by '{}': {}", dotted, message))
    };

    let mut current = schema;
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if segment == "id" && last {
            return Ok(());
        }
        match current.attribute_def(segment) {
            Some(AttributeDefinition::Scalar { ty, .. }) if last => {
                return if type_mapping::is_sortable(*ty) {
                    Ok(())
                } else {
                    Err(invalid("attribute type is not sortable"))
                };
            }
            Some(AttributeDefinition::Relation { target, .. }) if !last => {
                current = registry.get(target)?;
            }
            Some(AttributeDefinition::MorphRelation { .. }) => {
                return Err(invalid("polymorphic relations cannot be sorted on"))
            }
            Some(_) => return Err(invalid("path must end on a scalar attribute")),
            None => return Err(invalid("unknown attribute")),
        }
    }
    Err(invalid("empty path"))
}
