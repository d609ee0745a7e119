//! Lifecycle event types and definitions
//!
//! This module defines the structure of lifecycle events
//! that flow through the signal system.

use serde::{Deserialize, Serialize};
use std::fmt;
use type_mapping::Entity;
use uuid::Uuid;

/// Lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    /// Public event name, as seen by webhook-style consumers
    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::Create => "entry.create",
            EventKind::Update => "entry.update",
            EventKind::Delete => "entry.delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name())
    }
}

/// Event emitted once per successful mutation, after the storage engine committed it
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Unique event ID
    pub id: Uuid,
    /// Event kind
    pub kind: EventKind,
    /// Content-type identifier
    pub uid: String,
    /// The resulting entity, shaped as returned to the caller
    pub entity: Entity,
    /// Event timestamp (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl LifecycleEvent {
    pub fn new(kind: EventKind, uid: impl Into<String>, entity: Entity) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            uid: uid.into(),
            entity,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.kind.event_name()
    }
}
