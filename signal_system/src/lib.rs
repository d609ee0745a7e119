//! Signal system for entity lifecycle events
//!
//! This crate provides the queue hand-off between the entity service, which emits
//! lifecycle events after a mutation commits, and the subscribers that react to them.

/// Conditional debug logging, compiled in only with the `debug-logging` feature
#[cfg(feature = "debug-logging")]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

pub mod event;
pub mod manager;
pub mod pattern;
pub mod prelude;
pub mod types;

pub use event::{EventKind, LifecycleEvent};
pub use manager::{CallbackHandle, CallbackId, SignalConfig, SignalManager, SignalStats};
pub use pattern::UidPattern;
pub use types::EventCallback;
