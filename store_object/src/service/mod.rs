//! Entity service façade
//!
//! Every public operation follows the same sequence: wrap and normalize the
//! raw parameters, run the base fetch or mutation, populate relations, wrap
//! the result and, for mutations, emit a lifecycle event. Parameters are
//! fully validated before the storage engine is called.

mod read;
mod relations;
mod write;

use config::PaginationConfig;
use serde::Serialize;
use serde_json::Value;
use signal_system::{EventKind, LifecycleEvent, SignalManager};
use std::sync::Arc;
use type_mapping::{Entity, EntityId};

use crate::errors::EntityServiceError;
use crate::pagination::{paginate, PaginatedResult};
use crate::params::{FilterExpression, Normalizer, PaginationSpec, ParamKind, ParamsBag};
use crate::populate::loader::{populate_entities, PopulateContext};
use crate::schema::{ContentTypeSchema, SchemaRegistry};
use crate::shape::shape_record;
use crate::storage::{QueryDescriptor, RawRecord, StorageEngine};
use crate::wrapper::{Action, EntityWrappers, WrapContext, WrappedResult};

/// Result of `find_many`: single types hold at most one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FindManyResult {
    Single(Option<Entity>),
    Collection(Vec<Entity>),
}

impl FindManyResult {
    pub fn into_vec(self) -> Vec<Entity> {
        match self {
            FindManyResult::Single(entity) => entity.into_iter().collect(),
            FindManyResult::Collection(entities) => entities,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FindManyResult::Single(entity) => usize::from(entity.is_some()),
            FindManyResult::Collection(entities) => entities.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of the bulk delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteManyResult {
    pub count: u64,
}

/// Schema-driven entity operations over a storage engine
pub struct EntityService {
    registry: Arc<SchemaRegistry>,
    storage: Arc<dyn StorageEngine>,
    signals: Option<Arc<SignalManager>>,
    wrappers: EntityWrappers,
    config: PaginationConfig,
}

impl std::fmt::Debug for EntityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("content_types", &self.registry.len())
            .field("has_signals", &self.has_signals())
            .field("wrappers", &self.wrappers)
            .field("config", &self.config)
            .finish()
    }
}

impl EntityService {
    /// Service with the default wrapper chain and no signal manager
    pub fn new(
        registry: Arc<SchemaRegistry>,
        storage: Arc<dyn StorageEngine>,
        config: PaginationConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            signals: None,
            wrappers: EntityWrappers::with_defaults(),
            config,
        }
    }

    pub fn with_signal_manager(mut self, signals: Arc<SignalManager>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn set_signal_manager(&mut self, signals: Arc<SignalManager>) {
        self.signals = Some(signals);
    }

    pub fn remove_signal_manager(&mut self) {
        self.signals = None;
    }

    pub fn has_signals(&self) -> bool {
        self.signals.is_some()
    }

    /// Replace the wrapper chain
    pub fn with_wrappers(mut self, wrappers: EntityWrappers) -> Self {
        self.wrappers = wrappers;
        self
    }

    pub fn wrappers_mut(&mut self) -> &mut EntityWrappers {
        &mut self.wrappers
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// Run raw parameters through the wrapper chain of `uid`
    pub async fn wrap_params(
        &self,
        uid: &str,
        action: Action,
        params: Value,
    ) -> Result<Value, EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let ctx = WrapContext { uid, action, schema };
        self.wrappers.wrap_params(params, &ctx).await
    }

    /// Run a result through the wrapper chain of `uid`
    pub async fn wrap_result(
        &self,
        uid: &str,
        action: Action,
        result: WrappedResult,
    ) -> Result<WrappedResult, EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let ctx = WrapContext { uid, action, schema };
        self.wrappers.wrap_result(result, &ctx).await
    }

    /// Hand a lifecycle event to the signal manager; never blocks
    pub fn emit_event(&self, uid: &str, kind: EventKind, entity: &Entity) {
        if let Some(signals) = &self.signals {
            crate::debug_log!(uid = uid, event = kind.event_name(), id = %entity.id, "Emitting lifecycle event");
            signals.emit(LifecycleEvent::new(kind, uid, entity.clone()));
        }
    }

    fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(&self.registry, &self.config)
    }

    fn populate_context(&self) -> PopulateContext<'_> {
        PopulateContext {
            registry: &self.registry,
            storage: self.storage.as_ref(),
        }
    }

    /// Resolve the schema, wrap and normalize the parameters of one call
    async fn prepare(
        &self,
        uid: &str,
        action: Action,
        allowed: &[ParamKind],
        params: Value,
    ) -> Result<(&ContentTypeSchema, ParamsBag), EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let ctx = WrapContext { uid, action, schema };
        let params = self.wrappers.wrap_params(params, &ctx).await?;
        let bag = self.normalizer().normalize(uid, allowed, &params)?;
        crate::trace_log!(uid = uid, action = action.name(), "Parameters prepared");
        Ok((schema, bag))
    }

    /// Shape records into entities and populate them
    async fn materialize(
        &self,
        schema: &ContentTypeSchema,
        records: &[RawRecord],
        params: &ParamsBag,
    ) -> Result<Vec<Entity>, EntityServiceError> {
        let mut entities: Vec<Entity> = records
            .iter()
            .map(|record| shape_record(schema, record, params.fields.as_deref()))
            .collect();
        let ctx = self.populate_context();
        populate_entities(&ctx, records, &mut entities, &params.populate).await?;
        Ok(entities)
    }

    async fn fetch_by_id(
        &self,
        schema: &ContentTypeSchema,
        id: &EntityId,
        params: &ParamsBag,
    ) -> Result<Option<RawRecord>, EntityServiceError> {
        let descriptor = QueryDescriptor::for_params(schema, params)
            .filter(FilterExpression::id_eq(id))
            .limit(1);
        let outcome = self.storage.execute(&schema.uid, &descriptor).await?;
        Ok(outcome.records.into_iter().next())
    }

    /// Fetch the window described by `params.pagination`, then populate it in one pass
    async fn find_paginated(
        &self,
        schema: &ContentTypeSchema,
        params: &ParamsBag,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        let descriptor = QueryDescriptor::for_params(schema, params);
        let spec = params.pagination.unwrap_or_else(PaginationSpec::all);

        let page = paginate(&spec, &self.config, |offset, limit| {
            let query = descriptor.clone().window(offset, limit);
            async move {
                let outcome = self.storage.execute(&schema.uid, &query).await?;
                Ok::<_, EntityServiceError>((outcome.records, outcome.total))
            }
        })
        .await?;

        let results = self.materialize(schema, &page.results, params).await?;
        Ok(PaginatedResult {
            results,
            pagination: page.pagination,
        })
    }
}

#[cfg(test)]
mod tests;
