//! Content-type schemas and the registry that resolves them by identifier

pub mod attribute;
pub mod content_type;
mod parse;
pub mod registry;

pub use attribute::{AttributeDefinition, Cardinality, ScalarConstraints};
pub use content_type::{ContentTypeKind, ContentTypeSchema, PUBLISHED_AT};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
