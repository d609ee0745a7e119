//! Storage engine seam
//!
//! The entity service never touches persistence directly: reads go through
//! [`StorageEngine::execute`] with a [`QueryDescriptor`], writes through
//! [`StorageEngine::execute_mutation`].

mod memory;
mod query;

pub use memory::InMemoryStorage;
pub use query::QueryDescriptor;

use async_trait::async_trait;
use serde_json::{Map, Value};
use type_mapping::EntityId;

use crate::errors::StorageError;
use crate::params::EntityData;

/// A stored row in storage form
///
/// Relation attributes hold the related id, an array of ids, or
/// `{"__type", "id"}` references for polymorphic relations.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: EntityId,
    pub values: Map<String, Value>,
}

impl RawRecord {
    pub fn new(id: impl Into<EntityId>, values: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            values,
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }
}

/// Result of a read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    /// Records inside the requested window, in result order
    pub records: Vec<RawRecord>,
    /// Number of records matching the filters, ignoring offset and limit
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Create { data: EntityData },
    /// Attributes absent from `data` are left untouched
    Update { id: EntityId, data: EntityData },
    Delete { id: EntityId },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
        }
    }
}

/// Persistence backend used by the entity service
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Run a read against the content type `uid`
    async fn execute(&self, uid: &str, query: &QueryDescriptor) -> Result<QueryOutcome, StorageError>;

    /// Apply a write; returns the resulting record (the removed one for deletes),
    /// or `None` when the target id does not exist
    async fn execute_mutation(
        &self,
        uid: &str,
        mutation: Mutation,
    ) -> Result<Option<RawRecord>, StorageError>;
}
