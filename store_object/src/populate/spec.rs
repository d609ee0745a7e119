use serde_json::{json, Map, Value};

use crate::errors::EntityServiceError;
use crate::params::join_path;

/// Parsed shape of a `populate` parameter, before schema resolution
#[derive(Debug, Clone, PartialEq)]
pub enum PopulateSpec {
    /// `true` or `"*"`: every relation, one level deep
    All,
    /// `["author", "tags"]` or `"author,tags"`
    Fields(Vec<String>),
    /// `{"author": {...}, "tags": true}`
    Nested(Vec<(String, NestedPopulate)>),
}

/// Parameters for one populated relation
#[derive(Debug, Clone, PartialEq)]
pub enum NestedPopulate {
    /// Raw nested parameters (`null` when given as `true`)
    Params(Value),
    /// Per-target parameters of a polymorphic relation (`{"on": {...}}`)
    Fragments(Vec<(String, Value)>),
}

impl PopulateSpec {
    /// Parse a raw populate value; `false`, `null` and empty selections yield `None`
    pub fn parse(raw: &Value, path: &str) -> Result<Option<Self>, EntityServiceError> {
        match raw {
            Value::Null | Value::Bool(false) => Ok(None),
            Value::Bool(true) => Ok(Some(PopulateSpec::All)),
            Value::String(s) => {
                let names: Vec<&str> = s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
                Ok(from_names(&names))
            }
            Value::Array(items) => {
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::trim).ok_or_else(|| {
                            EntityServiceError::invalid_populate(path, "expected relation names")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(from_names(&names))
            }
            Value::Object(map) => parse_object(map, path),
            _ => Err(EntityServiceError::invalid_populate(
                path,
                "populate must be a boolean, a string, an array or an object",
            )),
        }
    }
}

/// Relation names; dotted names (`author.avatar`) populate nested relations
fn from_names(names: &[&str]) -> Option<PopulateSpec> {
    if names.is_empty() {
        return None;
    }
    if names.contains(&"*") {
        return Some(PopulateSpec::All);
    }
    if !names.iter().any(|name| name.contains('.')) {
        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if !unique.iter().any(|u| u == name) {
                unique.push(name.to_string());
            }
        }
        return Some(PopulateSpec::Fields(unique));
    }

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for name in names {
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (*name, None),
        };
        let index = match grouped.iter().position(|(h, _)| h == head) {
            Some(index) => index,
            None => {
                grouped.push((head.to_string(), Vec::new()));
                grouped.len() - 1
            }
        };
        if let Some(rest) = rest {
            grouped[index].1.push(rest.to_string());
        }
    }

    Some(PopulateSpec::Nested(
        grouped
            .into_iter()
            .map(|(head, rest)| {
                let nested = if rest.is_empty() {
                    Value::Null
                } else {
                    json!({ "populate": rest })
                };
                (head, NestedPopulate::Params(nested))
            })
            .collect(),
    ))
}

fn parse_object(
    map: &Map<String, Value>,
    path: &str,
) -> Result<Option<PopulateSpec>, EntityServiceError> {
    let mut entries = Vec::with_capacity(map.len());

    for (field, value) in map {
        let field_path = join_path(path, field);
        let nested = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::Bool(true) => NestedPopulate::Params(Value::Null),
            Value::Object(params) if params.contains_key("on") => {
                if params.len() > 1 {
                    return Err(EntityServiceError::invalid_populate(
                        field_path,
                        "'on' cannot be combined with other parameters",
                    ));
                }
                NestedPopulate::Fragments(parse_fragments(&params["on"], &join_path(&field_path, "on"))?)
            }
            Value::Object(_) => NestedPopulate::Params(value.clone()),
            _ => {
                return Err(EntityServiceError::invalid_populate(
                    field_path,
                    "expected a boolean or an object",
                ))
            }
        };
        entries.push((field.clone(), nested));
    }

    Ok(Some(PopulateSpec::Nested(entries)))
}

fn parse_fragments(raw: &Value, path: &str) -> Result<Vec<(String, Value)>, EntityServiceError> {
    let map = raw.as_object().ok_or_else(|| {
        EntityServiceError::invalid_populate(path, "'on' expects an object keyed by content type")
    })?;

    let mut fragments = Vec::with_capacity(map.len());
    for (uid, value) in map {
        let params = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::Bool(true) => Value::Null,
            Value::Object(_) => value.clone(),
            _ => {
                return Err(EntityServiceError::invalid_populate(
                    join_path(path, uid),
                    "expected a boolean or an object",
                ))
            }
        };
        fragments.push((uid.clone(), params));
    }
    Ok(fragments)
}
