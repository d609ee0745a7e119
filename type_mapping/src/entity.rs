//! API-shaped entity values
//!
//! An `Entity` is constructed per response: an identifier plus the attributes the caller
//! selected, with populated relations nested as further entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

/// Opaque entity identifier, unique per content type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric ID (auto-increment keys)
    Numeric(i64),
    /// String-based ID (UUIDs, document ids)
    String(String),
}

impl EntityId {
    /// Read an identifier out of a JSON value; numeric strings become numeric IDs
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntityId::Numeric),
            Value::String(s) if !s.is_empty() => Some(Self::from(s.as_str())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Numeric(n) => Value::from(*n),
            EntityId::String(s) => Value::String(s.clone()),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Numeric(n) => write!(f, "{}", n),
            EntityId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for EntityId {
    fn from(id: i32) -> Self {
        EntityId::Numeric(id as i64)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Numeric(id)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        EntityId::Numeric(id as i64)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(n) => EntityId::Numeric(n),
            Err(_) => EntityId::String(id.to_string()),
        }
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::from(id.as_str())
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

/// The value held by one attribute of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(Value),
    Relation(RelationValue),
}

/// A populated relation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelationValue {
    /// To-one relation; `None` when the relation is empty
    One(Option<Box<Entity>>),
    /// To-many relation in relation order
    Many(Vec<Entity>),
    /// Number of related entities, when population asked for a count
    Count { count: u64 },
}

impl RelationValue {
    /// Entities held by this relation, in order
    pub fn entities(&self) -> Vec<&Entity> {
        match self {
            RelationValue::One(Some(entity)) => vec![entity.as_ref()],
            RelationValue::One(None) | RelationValue::Count { .. } => Vec::new(),
            RelationValue::Many(entities) => entities.iter().collect(),
        }
    }
}

/// An API-shaped entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style scalar insertion
    pub fn with_scalar(mut self, name: &str, value: Value) -> Self {
        self.set_scalar(name, value);
        self
    }

    pub fn set_scalar(&mut self, name: &str, value: Value) {
        self.attributes
            .insert(name.to_string(), AttributeValue::Scalar(value));
    }

    pub fn set_relation(&mut self, name: &str, value: RelationValue) {
        self.attributes
            .insert(name.to_string(), AttributeValue::Relation(value));
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        match self.attributes.get(name) {
            Some(AttributeValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        match self.attributes.get(name) {
            Some(AttributeValue::Relation(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Serialize into the JSON shape returned to API callers
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
