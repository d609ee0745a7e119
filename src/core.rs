//! Core EntityHaus functionality
//!
//! This module contains the main EntityHaus struct, which wires the schema
//! registry, the storage engine, the signal manager and the entity service together.

use std::future::Future;
use std::sync::Arc;

use config::AppConfig;
use signal_system::{CallbackHandle, EventKind, LifecycleEvent, SignalManager, UidPattern};
use store_object::{EntityService, EntityWrapper, SchemaRegistry, StorageEngine};

use crate::errors::EntityHausError;

/// Main EntityHaus coordinator
pub struct EntityHaus {
    config: AppConfig,
    registry: Arc<SchemaRegistry>,
    signals: Arc<SignalManager>,
    service: EntityService,
}

impl std::fmt::Debug for EntityHaus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityHaus")
            .field("content_types", &self.registry.uids())
            .field("signals", &self.signals)
            .finish()
    }
}

impl EntityHaus {
    /// Create the coordinator. Must be called from within a Tokio runtime
    /// (the signal manager spawns its dispatch task).
    pub fn new(
        config: AppConfig,
        registry: SchemaRegistry,
        storage: Arc<dyn StorageEngine>,
    ) -> Result<Self, EntityHausError> {
        config.validate()?;

        let registry = Arc::new(registry);
        let signals = Arc::new(SignalManager::new(config.signal.clone()));
        let service = EntityService::new(registry.clone(), storage, config.pagination.clone())
            .with_signal_manager(signals.clone());

        tracing::info!(content_types = registry.len(), "EntityHaus initialized");
        Ok(Self {
            config,
            registry,
            signals,
            service,
        })
    }

    pub fn entity_service(&self) -> &EntityService {
        &self.service
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn signal_manager(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    /// Subscribe to lifecycle events of content types matching `pattern`
    pub fn on_event<P, F, Fut>(
        &self,
        pattern: P,
        kind: Option<EventKind>,
        handler: F,
    ) -> Result<CallbackHandle, EntityHausError>
    where
        P: Into<UidPattern>,
        F: Fn(LifecycleEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Ok(self.signals.subscribe(pattern, kind, handler)?)
    }

    /// Wait until every event emitted so far has reached its subscribers
    pub async fn flush_events(&self) {
        self.signals.flush().await;
    }

    /// Register a wrapper for every content type
    pub fn add_wrapper(&mut self, wrapper: Arc<dyn EntityWrapper>) {
        self.service.wrappers_mut().add(wrapper);
    }

    /// Register a wrapper for one content type
    pub fn add_type_wrapper(
        &mut self,
        uid: &str,
        wrapper: Arc<dyn EntityWrapper>,
    ) -> Result<(), EntityHausError> {
        self.registry.get(uid)?;
        self.service.wrappers_mut().add_for(uid, wrapper);
        Ok(())
    }
}
