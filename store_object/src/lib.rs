//! Store Object - schema-driven entity data access for EntityHaus
//!
//! This crate provides the content-type registry, parameter normalization,
//! relation population, pagination and the entity service façade that
//! ties them to a pluggable storage engine.

/// Debug-level logging gated behind the `debug-logging` feature
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-logging")]
        tracing::debug!($($arg)*);
    };
}

/// Trace-level logging gated behind the `debug-logging` feature
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug-logging")]
        tracing::trace!($($arg)*);
    };
}

pub mod errors;
pub mod pagination;
pub mod params;
pub mod populate;
pub mod prelude;
pub mod schema;
pub mod service;
pub mod storage;
pub mod validation;
pub mod wrapper;

mod shape;

pub use errors::{EntityServiceError, SchemaError, StorageError};
pub use pagination::{PaginatedResult, PaginationMeta};
pub use params::{
    EntityData, FilterExpression, FilterOperator, Normalizer, PaginationSpec, ParamKind,
    ParamsBag, PublicationState, SortEntry, SortOrder,
};
pub use populate::{PopulateSpec, PopulationStep, PopulationTarget};
pub use schema::{
    AttributeDefinition, Cardinality, ContentTypeKind, ContentTypeSchema, ScalarConstraints,
    SchemaRegistry, SchemaRegistryBuilder,
};
pub use service::{DeleteManyResult, EntityService, FindManyResult};
pub use storage::{
    InMemoryStorage, Mutation, QueryDescriptor, QueryOutcome, RawRecord, StorageEngine,
};
pub use validation::{ValidatedAttributeName, ValidatedUid, ValidationError};
pub use wrapper::{
    Action, DefaultValuesWrapper, EntityWrapper, EntityWrappers, WrapContext, WrappedResult,
};
