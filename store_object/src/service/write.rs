use serde_json::{Map, Value};
use signal_system::EventKind;
use type_mapping::{Entity, EntityId};

use super::{DeleteManyResult, EntityService};
use crate::errors::{EntityServiceError, StorageError};
use crate::pagination::paginate;
use crate::params::data::{check_not_nulled, check_required};
use crate::params::{allowed, EntityData, PaginationSpec, ParamsBag};
use crate::schema::ContentTypeSchema;
use crate::shape::shape_record;
use crate::storage::{Mutation, QueryDescriptor, RawRecord};
use crate::wrapper::{Action, WrappedResult};

impl EntityService {
    /// Create an entity from `params.data`; emits `entry.create`
    pub async fn create(&self, uid: &str, params: Value) -> Result<Entity, EntityServiceError> {
        let (schema, bag) = self
            .prepare(uid, Action::Create, allowed::CREATE, params)
            .await?;
        let data = bag.data.clone().unwrap_or_default();
        check_required(schema, &data, "data")?;

        self.insert(schema, Action::Create, data, &bag).await
    }

    /// Copy the declared attributes of `id`, apply `params.data` on top and create
    /// the result. Fails with `EntityNotFound` when `id` does not exist.
    pub async fn clone_entity(
        &self,
        uid: &str,
        id: impl Into<EntityId>,
        params: Value,
    ) -> Result<Entity, EntityServiceError> {
        let id = id.into();
        let (schema, bag) = self
            .prepare(uid, Action::Clone, allowed::CLONE, params)
            .await?;

        let source = self
            .fetch_by_id(schema, &id, &ParamsBag::default())
            .await?
            .ok_or_else(|| EntityServiceError::not_found(uid, &id))?;

        let mut merged: Map<String, Value> = source
            .values
            .into_iter()
            .filter(|(name, _)| schema.attribute_def(name).is_some())
            .collect();
        if let Some(overrides) = &bag.data {
            for (name, value) in overrides.iter() {
                merged.insert(name.clone(), value.clone());
            }
        }
        let data = EntityData::from_map(merged);
        check_required(schema, &data, "data")?;

        crate::debug_log!(uid = uid, source = %id, "Cloning entity");
        self.insert(schema, Action::Clone, data, &bag).await
    }

    async fn insert(
        &self,
        schema: &ContentTypeSchema,
        action: Action,
        data: EntityData,
        bag: &ParamsBag,
    ) -> Result<Entity, EntityServiceError> {
        let uid = schema.uid.as_str();
        let record = self
            .storage
            .execute_mutation(uid, Mutation::Create { data })
            .await?
            .ok_or_else(|| StorageError::new(format!("create on '{}' returned no record", uid)))?;

        let entity = self.populated(schema, record, bag).await?;
        let entity = self.wrap_committed(uid, action, entity).await?;

        self.emit_event(uid, EventKind::Create, &entity);
        Ok(entity)
    }

    /// Apply `params.data` to `id`; `None` (and no event) when it does not exist
    pub async fn update(
        &self,
        uid: &str,
        id: impl Into<EntityId>,
        params: Value,
    ) -> Result<Option<Entity>, EntityServiceError> {
        let id = id.into();
        let (schema, bag) = self
            .prepare(uid, Action::Update, allowed::UPDATE, params)
            .await?;
        let data = bag.data.clone().unwrap_or_default();
        check_not_nulled(schema, &data, "data")?;

        let mutation = Mutation::Update {
            id: id.clone(),
            data,
        };
        let Some(record) = self.storage.execute_mutation(uid, mutation).await? else {
            crate::debug_log!(uid = uid, id = %id, "update: no entity");
            return Ok(None);
        };

        let entity = self.populated(schema, record, &bag).await?;
        let entity = self.wrap_committed(uid, Action::Update, entity).await?;

        self.emit_event(uid, EventKind::Update, &entity);
        Ok(Some(entity))
    }

    /// Remove `id` and return it as it was; `None` (and no event) when it does not exist.
    /// Relations are populated before the entity is removed.
    pub async fn delete(
        &self,
        uid: &str,
        id: impl Into<EntityId>,
        params: Value,
    ) -> Result<Option<Entity>, EntityServiceError> {
        let id = id.into();
        let (schema, bag) = self
            .prepare(uid, Action::Delete, allowed::DELETE, params)
            .await?;

        let Some(record) = self.fetch_by_id(schema, &id, &bag).await? else {
            crate::debug_log!(uid = uid, id = %id, "delete: no entity");
            return Ok(None);
        };
        let entity = self.populated(schema, record, &bag).await?;

        if self
            .storage
            .execute_mutation(uid, Mutation::Delete { id })
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let entity = self.wrap_committed(uid, Action::Delete, entity).await?;

        self.emit_event(uid, EventKind::Delete, &entity);
        Ok(Some(entity))
    }

    /// Legacy bulk delete of every entity matching `filters` / `_q`.
    /// Emits one `entry.delete` per removed entity.
    pub async fn delete_many(
        &self,
        uid: &str,
        params: Value,
    ) -> Result<DeleteManyResult, EntityServiceError> {
        let (schema, bag) = self
            .prepare(uid, Action::DeleteMany, allowed::DELETE_MANY, params)
            .await?;

        let descriptor = QueryDescriptor::for_params(schema, &bag);
        let matching = paginate(&PaginationSpec::all(), &self.config, |offset, limit| {
            let query = descriptor.clone().window(offset, limit);
            async move {
                let outcome = self.storage.execute(uid, &query).await?;
                Ok::<_, EntityServiceError>((outcome.records, outcome.total))
            }
        })
        .await?;

        let mut deleted = Vec::with_capacity(matching.results.len());
        for record in matching.results {
            let mutation = Mutation::Delete {
                id: record.id.clone(),
            };
            if self.storage.execute_mutation(uid, mutation).await?.is_some() {
                deleted.push(shape_record(schema, &record, None));
            }
        }

        let count = deleted.len() as u64;
        let deleted = self
            .wrap_result(uid, Action::DeleteMany, WrappedResult::Entities(deleted))
            .await?
            .into_entities();
        for entity in &deleted {
            self.emit_event(uid, EventKind::Delete, entity);
        }

        crate::debug_log!(uid = uid, count = count, "deleteMany");
        Ok(DeleteManyResult { count })
    }

    /// `wrap_result` over the entity of a committed mutation; wrappers may reshape it
    /// but not discard it
    async fn wrap_committed(
        &self,
        uid: &str,
        action: Action,
        entity: Entity,
    ) -> Result<Entity, EntityServiceError> {
        let entity = self
            .wrap_result(uid, action, WrappedResult::Entity(Some(entity)))
            .await?
            .into_entity()
            .ok_or_else(|| {
                StorageError::new(format!("result of {} on '{}' was discarded", action, uid))
            })?;
        Ok(entity)
    }

    async fn populated(
        &self,
        schema: &ContentTypeSchema,
        record: RawRecord,
        bag: &ParamsBag,
    ) -> Result<Entity, EntityServiceError> {
        let entity = self
            .materialize(schema, std::slice::from_ref(&record), bag)
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| shape_record(schema, &record, bag.fields.as_deref()));
        Ok(entity)
    }
}

