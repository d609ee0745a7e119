use serde_json::Value;

use crate::errors::EntityServiceError;
use crate::schema::ContentTypeSchema;

/// Parse a field selection; `None` selects every scalar attribute.
///
/// `id` is always returned and is dropped from explicit selections.
pub(crate) fn parse_fields(
    schema: &ContentTypeSchema,
    raw: &Value,
    path: &str,
) -> Result<Option<Vec<String>>, EntityServiceError> {
    let names: Vec<&str> = match raw {
        Value::Null => return Ok(None),
        Value::String(s) => s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::trim).ok_or_else(|| {
                    EntityServiceError::invalid_parameter(path, "fields must be strings")
                })
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(EntityServiceError::invalid_parameter(
                path,
                "fields must be a string or an array of strings",
            ))
        }
    };

    if names.contains(&"*") {
        return Ok(None);
    }

    let mut fields: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name == "id" || fields.iter().any(|f| f == name) {
            continue;
        }
        match schema.attribute_def(name) {
            Some(def) if !def.is_relation() => fields.push(name.to_string()),
            Some(_) => {
                return Err(EntityServiceError::invalid_parameter(
                    path,
                    format!("'{}' is a relation, use populate to select it", name),
                ))
            }
            None => {
                return Err(EntityServiceError::invalid_parameter(
                    path,
                    format!("unknown attribute '{}' on {}", name, schema.uid),
                ))
            }
        }
    }
    Ok(Some(fields))
}
