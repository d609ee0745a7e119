use thiserror::Error;
use type_mapping::EntityId;

use crate::validation::ValidationError;

/// Errors surfaced by entity service operations
#[derive(Error, Debug)]
pub enum EntityServiceError {
    #[error("Content type not found: {0}")]
    SchemaNotFound(String),

    #[error("Invalid parameter '{path}': {message}")]
    InvalidParameter { path: String, message: String },

    #[error("Invalid populate '{path}': {message}")]
    InvalidPopulate { path: String, message: String },

    #[error("Entity not found: {uid} with id {id}")]
    EntityNotFound { uid: String, id: EntityId },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EntityServiceError {
    pub fn invalid_parameter(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_populate(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPopulate {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_found(uid: &str, id: &EntityId) -> Self {
        Self::EntityNotFound {
            uid: uid.to_string(),
            id: id.clone(),
        }
    }

    /// Dotted parameter path for validation errors
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::InvalidParameter { path, .. } | Self::InvalidPopulate { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Failure reported by a storage engine, propagated unchanged
#[derive(Error, Debug)]
#[error("Storage error: {message}")]
pub struct StorageError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Schema definitions rejected at registry build time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Invalid content type uid '{uid}': {reason}")]
    InvalidUid { uid: String, reason: ValidationError },

    #[error("Invalid attribute '{attribute}' on {uid}: {reason}")]
    InvalidAttributeName {
        uid: String,
        attribute: String,
        reason: ValidationError,
    },

    #[error("Content type registered twice: {0}")]
    DuplicateContentType(String),

    #[error("Attribute '{attribute}' declared twice on {uid}")]
    DuplicateAttribute { uid: String, attribute: String },

    #[error("Relation {uid}.{attribute} targets unknown content type '{target}'")]
    UnknownTarget {
        uid: String,
        attribute: String,
        target: String,
    },

    #[error("Polymorphic relation {uid}.{attribute} declares no targets")]
    EmptyMorphTargets { uid: String, attribute: String },

    #[error("Invalid definition for {uid}: {message}")]
    InvalidDefinition { uid: String, message: String },
}
