//! Convenience re-exports for common signal-system usage

// Core signal system components
pub use crate::event::{EventKind, LifecycleEvent};
pub use crate::manager::{CallbackHandle, CallbackId, SignalConfig, SignalManager, SignalStats};
pub use crate::pattern::UidPattern;
pub use crate::types::EventCallback;

// Common external dependencies
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;
