use serde::{Deserialize, Serialize};
use type_mapping::AttributeType;

use super::attribute::AttributeDefinition;

/// Attribute added to draft-and-publish content types; `null` means draft
pub const PUBLISHED_AT: &str = "published_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentTypeKind {
    #[serde(rename = "collectionType")]
    Collection,
    #[serde(rename = "singleType")]
    Single,
}

/// Declaration of one content type
#[derive(Debug, Clone, PartialEq)]
pub struct ContentTypeSchema {
    pub uid: String,
    pub kind: ContentTypeKind,
    pub draft_and_publish: bool,
    attributes: Vec<(String, AttributeDefinition)>,
}

impl ContentTypeSchema {
    pub fn new(uid: impl Into<String>, kind: ContentTypeKind) -> Self {
        Self {
            uid: uid.into(),
            kind,
            draft_and_publish: false,
            attributes: Vec::new(),
        }
    }

    pub fn collection(uid: impl Into<String>) -> Self {
        Self::new(uid, ContentTypeKind::Collection)
    }

    pub fn single(uid: impl Into<String>) -> Self {
        Self::new(uid, ContentTypeKind::Single)
    }

    /// Declare an attribute; order of declaration is kept
    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.push((name.into(), definition));
        self
    }

    /// Enable draft-and-publish, adding the `published_at` attribute when missing
    pub fn with_draft_and_publish(mut self) -> Self {
        self.draft_and_publish = true;
        if self.attribute_def(PUBLISHED_AT).is_none() {
            self.attributes.push((
                PUBLISHED_AT.to_string(),
                AttributeDefinition::scalar(AttributeType::DateTime),
            ));
        }
        self
    }

    pub fn is_collection_type(&self) -> bool {
        self.kind == ContentTypeKind::Collection
    }

    pub fn is_single_type(&self) -> bool {
        self.kind == ContentTypeKind::Single
    }

    pub fn attribute_def(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, def)| def)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeDefinition)> {
        self.attributes.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn scalar_attributes(&self) -> impl Iterator<Item = (&str, &AttributeDefinition)> {
        self.attributes().filter(|(_, def)| !def.is_relation())
    }

    pub fn relation_attributes(&self) -> impl Iterator<Item = (&str, &AttributeDefinition)> {
        self.attributes().filter(|(_, def)| def.is_relation())
    }

    pub fn is_scalar(&self, name: &str) -> bool {
        self.attribute_def(name).is_some_and(|def| !def.is_relation())
    }
}
