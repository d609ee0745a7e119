//! Convenience re-exports for common EntityHaus usage
//!
//! # Example
//!
//! ```rust
//! use entityhaus::prelude::*;
//! ```

// Core EntityHaus components
pub use crate::core::EntityHaus;
pub use crate::errors::EntityHausError;
pub use crate::loader::{load_schema_dir, load_schema_file};

// Re-export centralized config
pub use config::{AppConfig, PaginationConfig, SignalConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// Re-export signal system for event handling
pub use signal_system::{CallbackHandle, EventKind, LifecycleEvent, SignalManager, UidPattern};

// Common external dependencies
pub use serde::{Deserialize, Serialize};
pub use anyhow;
pub use tokio;
