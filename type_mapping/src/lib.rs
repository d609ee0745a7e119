//! Unified type mapping between schema attribute types and runtime values
//! This crate provides the value model shared across the entityhaus ecosystem:
//! scalar attribute types, value coercion and the API-shaped `Entity`.

pub mod entity;
pub mod types;
pub mod validate;

pub use entity::{AttributeValue, Entity, EntityId, RelationValue};
pub use types::{AttributeType, UnknownAttributeType};
pub use validate::{coerce_value, is_sortable, is_text_searchable, CoercionError};
