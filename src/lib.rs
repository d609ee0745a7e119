//! # EntityHaus
//!
//! Schema-driven entity data access: content types are described at runtime,
//! request parameters are validated against them, relations are populated in
//! batches and every mutation emits a lifecycle event. Persistence is delegated
//! to a pluggable storage engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use entityhaus::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SchemaRegistry::builder()
//!         .register(
//!             ContentTypeSchema::collection("article")
//!                 .attribute("title", AttributeDefinition::scalar(AttributeType::String)),
//!         )
//!         .build()?;
//!     let registry_for_storage = Arc::new(registry.clone());
//!     let storage = Arc::new(InMemoryStorage::new(registry_for_storage));
//!
//!     let haus = EntityHaus::new(AppConfig::default(), registry, storage)?;
//!     haus.on_event("article", Some(EventKind::Create), |event| async move {
//!         println!("created {}", event.entity.id);
//!         Ok(())
//!     })?;
//!
//!     let service = haus.entity_service();
//!     let article = service
//!         .create("article", json!({"data": {"title": "Hello"}}))
//!         .await?;
//!     println!("{}", article.to_json());
//!
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod errors;
pub mod loader;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::EntityHaus;
pub use errors::EntityHausError;
pub use loader::{load_schema_dir, load_schema_file};

// Re-export centralized config
pub use config::{AppConfig, PaginationConfig, SignalConfig};

// Re-export internal crates used by the public API
pub use signal_system;
pub use store_object;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use serde_json;
