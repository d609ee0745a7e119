//! Type definitions for signal system
//!
//! This module contains the callback type stored for each subscriber.

use crate::event::LifecycleEvent;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Async event callback type that returns a Result
pub type EventCallback =
    Arc<dyn Fn(LifecycleEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
