//! Schema definitions in the JSON layout used by content-type `schema.json` files

use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use type_mapping::AttributeType;

use super::attribute::{AttributeDefinition, Cardinality, ScalarConstraints};
use super::content_type::{ContentTypeKind, ContentTypeSchema};
use crate::errors::SchemaError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    uid: Option<String>,
    kind: ContentTypeKind,
    #[serde(default)]
    options: RawOptions,
    #[serde(default)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptions {
    #[serde(default)]
    draft_and_publish: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    #[serde(rename = "type")]
    ty: String,
    relation: Option<String>,
    target: Option<String>,
    targets: Option<Vec<String>>,
    #[serde(default)]
    required: bool,
    default: Option<Value>,
    #[serde(rename = "enum")]
    enum_values: Option<Vec<String>>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl ContentTypeSchema {
    /// Parse a schema document; the identifier comes from its `uid` key
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        Self::parse(None, value)
    }

    /// Parse a schema document whose identifier is known from elsewhere (file name, API name)
    pub fn from_json_with_uid(uid: &str, value: &Value) -> Result<Self, SchemaError> {
        Self::parse(Some(uid), value)
    }

    fn parse(uid: Option<&str>, value: &Value) -> Result<Self, SchemaError> {
        let declared_uid = value.get("uid").and_then(Value::as_str).unwrap_or("<unnamed>");
        let invalid = |uid: &str, message: String| SchemaError::InvalidDefinition {
            uid: uid.to_string(),
            message,
        };

        let raw: RawSchema = serde_json::from_value(value.clone())
            .map_err(|e| invalid(uid.unwrap_or(declared_uid), e.to_string()))?;
        let uid = match (uid, raw.uid) {
            (Some(uid), _) => uid.to_string(),
            (None, Some(uid)) => uid,
            (None, None) => return Err(invalid(declared_uid, "missing 'uid'".to_string())),
        };

        let mut schema = ContentTypeSchema::new(uid.clone(), raw.kind);
        for (name, attribute) in raw.attributes {
            let raw_attribute: RawAttribute = serde_json::from_value(attribute)
                .map_err(|e| invalid(&uid, format!("attribute '{}': {}", name, e)))?;
            let definition = parse_attribute(&raw_attribute)
                .map_err(|message| invalid(&uid, format!("attribute '{}': {}", name, message)))?;
            schema = schema.attribute(name, definition);
        }

        if raw.options.draft_and_publish {
            schema = schema.with_draft_and_publish();
        }
        Ok(schema)
    }
}

fn parse_attribute(raw: &RawAttribute) -> Result<AttributeDefinition, String> {
    if raw.ty == "relation" {
        let relation = raw.relation.as_deref().ok_or("relation kind is missing")?;
        let cardinality = Cardinality::from_relation_name(relation)
            .ok_or_else(|| format!("unknown relation kind '{}'", relation))?;

        if relation.starts_with("morph") {
            let targets = raw
                .targets
                .clone()
                .or_else(|| raw.target.clone().map(|t| vec![t]))
                .unwrap_or_default();
            return Ok(AttributeDefinition::morph(targets, cardinality));
        }

        let target = raw.target.clone().ok_or("relation target is missing")?;
        return Ok(AttributeDefinition::relation(target, cardinality));
    }

    let ty = AttributeType::from_str(&raw.ty).map_err(|e| e.to_string())?;
    Ok(AttributeDefinition::Scalar {
        ty,
        constraints: ScalarConstraints {
            required: raw.required,
            default: raw.default.clone(),
            enum_values: raw.enum_values.clone(),
            min_length: raw.min_length,
            max_length: raw.max_length,
        },
    })
}
