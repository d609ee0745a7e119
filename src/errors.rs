//! Error types for the EntityHaus crate
//!
//! This module contains all error types that can be returned by EntityHaus operations.

use std::path::PathBuf;
use thiserror::Error;

use config::ConfigError;
use store_object::{EntityServiceError, SchemaError};

#[derive(Error, Debug)]
pub enum EntityHausError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Service(#[from] EntityServiceError),

    #[error("Cannot read schema file {path}: {source}")]
    SchemaIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in schema file {path}: {source}")]
    SchemaJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Subscriber registration failed: {0}")]
    Subscription(#[from] anyhow::Error),
}
