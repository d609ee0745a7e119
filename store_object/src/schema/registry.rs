//! Registry of content-type schemas
//!
//! Built once at startup and shared read-only. Every relation target is
//! checked against the registered identifiers when the registry is built.

use std::collections::{HashMap, HashSet};

use super::attribute::AttributeDefinition;
use super::content_type::{ContentTypeSchema, PUBLISHED_AT};
use crate::errors::{EntityServiceError, SchemaError};
use crate::validation::{ValidatedAttributeName, ValidatedUid};

#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ContentTypeSchema>,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up a schema; unknown identifiers fail with `SchemaNotFound`
    pub fn get(&self, uid: &str) -> Result<&ContentTypeSchema, EntityServiceError> {
        self.schemas
            .get(uid)
            .ok_or_else(|| EntityServiceError::SchemaNotFound(uid.to_string()))
    }

    pub fn try_get(&self, uid: &str) -> Option<&ContentTypeSchema> {
        self.schemas.get(uid)
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.schemas.contains_key(uid)
    }

    pub fn is_collection_type(&self, uid: &str) -> bool {
        self.schemas
            .get(uid)
            .is_some_and(ContentTypeSchema::is_collection_type)
    }

    pub fn is_single_type(&self, uid: &str) -> bool {
        self.schemas
            .get(uid)
            .is_some_and(ContentTypeSchema::is_single_type)
    }

    /// Registered identifiers, sorted
    pub fn uids(&self) -> Vec<&str> {
        let mut uids: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        uids.sort_unstable();
        uids
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<ContentTypeSchema>,
}

impl SchemaRegistryBuilder {
    pub fn register(mut self, schema: ContentTypeSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    pub fn register_all(mut self, schemas: impl IntoIterator<Item = ContentTypeSchema>) -> Self {
        self.schemas.extend(schemas);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut schemas = HashMap::with_capacity(self.schemas.len());
        for schema in self.schemas {
            ValidatedUid::new(&schema.uid).map_err(|reason| SchemaError::InvalidUid {
                uid: schema.uid.clone(),
                reason,
            })?;
            if schemas.contains_key(&schema.uid) {
                return Err(SchemaError::DuplicateContentType(schema.uid));
            }
            schemas.insert(schema.uid.clone(), schema);
        }

        for schema in schemas.values() {
            validate_attributes(schema, &schemas)?;
        }

        crate::debug_log!(content_types = schemas.len(), "Schema registry built");
        Ok(SchemaRegistry { schemas })
    }
}

fn validate_attributes(
    schema: &ContentTypeSchema,
    schemas: &HashMap<String, ContentTypeSchema>,
) -> Result<(), SchemaError> {
    let uid = &schema.uid;
    let mut seen = HashSet::new();

    for (name, definition) in schema.attributes() {
        ValidatedAttributeName::new(name).map_err(|reason| SchemaError::InvalidAttributeName {
            uid: uid.clone(),
            attribute: name.to_string(),
            reason,
        })?;
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateAttribute {
                uid: uid.clone(),
                attribute: name.to_string(),
            });
        }

        let unknown_target = |target: &str| SchemaError::UnknownTarget {
            uid: uid.clone(),
            attribute: name.to_string(),
            target: target.to_string(),
        };

        match definition {
            AttributeDefinition::Scalar { ty, constraints } => {
                if let Some(values) = &constraints.enum_values {
                    if values.is_empty() {
                        return Err(SchemaError::InvalidDefinition {
                            uid: uid.clone(),
                            message: format!("enumeration '{}' declares no values", name),
                        });
                    }
                }
                if let (Some(min), Some(max)) = (constraints.min_length, constraints.max_length) {
                    if min > max {
                        return Err(SchemaError::InvalidDefinition {
                            uid: uid.clone(),
                            message: format!("'{}' has minLength greater than maxLength", name),
                        });
                    }
                }
                if let Some(default) = &constraints.default {
                    type_mapping::coerce_value(*ty, default).map_err(|e| {
                        SchemaError::InvalidDefinition {
                            uid: uid.clone(),
                            message: format!("default for '{}': {}", name, e),
                        }
                    })?;
                }
            }
            AttributeDefinition::Relation { target, .. } => {
                if !schemas.contains_key(target) {
                    return Err(unknown_target(target));
                }
            }
            AttributeDefinition::MorphRelation { targets, .. } => {
                if targets.is_empty() {
                    return Err(SchemaError::EmptyMorphTargets {
                        uid: uid.clone(),
                        attribute: name.to_string(),
                    });
                }
                if let Some(target) = targets.iter().find(|t| !schemas.contains_key(*t)) {
                    return Err(unknown_target(target));
                }
            }
        }
    }

    if schema.draft_and_publish && !schema.is_scalar(PUBLISHED_AT) {
        return Err(SchemaError::InvalidDefinition {
            uid: uid.clone(),
            message: format!("draft and publish requires a '{}' attribute", PUBLISHED_AT),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;
    use serde_json::json;
    use type_mapping::AttributeType;

    fn user() -> ContentTypeSchema {
        ContentTypeSchema::collection("api::user.user")
            .attribute("name", AttributeDefinition::scalar(AttributeType::String))
    }

    #[test]
    fn test_lookup_and_kinds() {
        let registry = SchemaRegistry::builder()
            .register(user())
            .register(ContentTypeSchema::single("api::homepage.homepage"))
            .build()
            .unwrap();

        assert!(registry.get("api::user.user").is_ok());
        assert!(matches!(
            registry.get("api::nope.nope"),
            Err(EntityServiceError::SchemaNotFound(uid)) if uid == "api::nope.nope"
        ));
        assert!(registry.is_collection_type("api::user.user"));
        assert!(registry.is_single_type("api::homepage.homepage"));
        assert!(!registry.is_single_type("api::nope.nope"));
        assert_eq!(registry.uids(), vec!["api::homepage.homepage", "api::user.user"]);
    }

    #[test]
    fn test_unknown_relation_target_rejected() {
        let article = ContentTypeSchema::collection("api::article.article").attribute(
            "author",
            AttributeDefinition::relation("api::author.author", Cardinality::One),
        );
        let err = SchemaRegistry::builder().register(article).build().unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownTarget {
                uid: "api::article.article".to_string(),
                attribute: "author".to_string(),
                target: "api::author.author".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = SchemaRegistry::builder()
            .register(user())
            .register(user())
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateContentType("api::user.user".to_string()));

        let twice = user().attribute("name", AttributeDefinition::scalar(AttributeType::Text));
        let err = SchemaRegistry::builder().register(twice).build().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateAttribute { attribute, .. } if attribute == "name"));
    }

    #[test]
    fn test_invalid_names_and_defaults_rejected() {
        let reserved = user().attribute("id", AttributeDefinition::scalar(AttributeType::Integer));
        assert!(matches!(
            SchemaRegistry::builder().register(reserved).build(),
            Err(SchemaError::InvalidAttributeName { .. })
        ));

        let bad_default = user().attribute(
            "age",
            AttributeDefinition::scalar(AttributeType::Integer).with_default(json!("old")),
        );
        assert!(matches!(
            SchemaRegistry::builder().register(bad_default).build(),
            Err(SchemaError::InvalidDefinition { .. })
        ));

        let empty_morph = user().attribute(
            "subject",
            AttributeDefinition::morph(Vec::<String>::new(), Cardinality::One),
        );
        assert!(matches!(
            SchemaRegistry::builder().register(empty_morph).build(),
            Err(SchemaError::EmptyMorphTargets { .. })
        ));
    }
}
