//! Convenience re-exports for common store-object usage

// Schema
pub use crate::schema::{
    AttributeDefinition, Cardinality, ContentTypeKind, ContentTypeSchema, SchemaRegistry,
};

// Service façade
pub use crate::service::{DeleteManyResult, EntityService, FindManyResult};
pub use crate::pagination::{PaginatedResult, PaginationMeta};

// Storage
pub use crate::storage::{InMemoryStorage, Mutation, QueryDescriptor, QueryOutcome, RawRecord, StorageEngine};

// Wrappers
pub use crate::wrapper::{Action, EntityWrapper, EntityWrappers, WrapContext, WrappedResult};

// Error types
pub use crate::errors::{EntityServiceError, SchemaError, StorageError};

// Entities
pub use type_mapping::{AttributeType, Entity, EntityId, RelationValue};

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use serde_json::{json, Value};
