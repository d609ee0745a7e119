use serde_json::Value;
use type_mapping::{Entity, EntityId};

use super::{EntityService, FindManyResult};
use crate::errors::EntityServiceError;
use crate::pagination::PaginatedResult;
use crate::params::allowed;
use crate::storage::QueryDescriptor;
use crate::wrapper::{Action, WrappedResult};

impl EntityService {
    /// Entities of `uid` matching `params`; single types yield at most one
    pub async fn find_many(
        &self,
        uid: &str,
        params: Value,
    ) -> Result<FindManyResult, EntityServiceError> {
        self.find_many_as(uid, Action::FindMany, params).await
    }

    /// Legacy alias of [`find_many`](Self::find_many); relation counts come from `populate.*.count`
    pub async fn find_with_relation_counts(
        &self,
        uid: &str,
        params: Value,
    ) -> Result<FindManyResult, EntityServiceError> {
        self.find_many_as(uid, Action::FindWithRelationCounts, params)
            .await
    }

    async fn find_many_as(
        &self,
        uid: &str,
        action: Action,
        params: Value,
    ) -> Result<FindManyResult, EntityServiceError> {
        let (schema, bag) = self.prepare(uid, action, allowed::FIND_MANY, params).await?;

        if schema.is_single_type() {
            let descriptor = QueryDescriptor::for_params(schema, &bag).limit(1);
            let outcome = self.storage.execute(uid, &descriptor).await?;
            let entity = self
                .materialize(schema, &outcome.records, &bag)
                .await?
                .into_iter()
                .next();
            let wrapped = self
                .wrap_result(uid, action, WrappedResult::Entity(entity))
                .await?;
            return Ok(FindManyResult::Single(wrapped.into_entity()));
        }

        let page = self.find_paginated(schema, &bag).await?;
        crate::debug_log!(uid = uid, found = page.results.len(), "findMany");
        let wrapped = self
            .wrap_result(uid, action, WrappedResult::Entities(page.results))
            .await?;
        Ok(FindManyResult::Collection(wrapped.into_entities()))
    }

    /// The entity `id` of `uid`, or `None` when it does not exist
    pub async fn find_one(
        &self,
        uid: &str,
        id: impl Into<EntityId>,
        params: Value,
    ) -> Result<Option<Entity>, EntityServiceError> {
        let id = id.into();
        let (schema, bag) = self
            .prepare(uid, Action::FindOne, allowed::FIND_ONE, params)
            .await?;

        let record = self.fetch_by_id(schema, &id, &bag).await?;
        let entity = match record {
            Some(record) => self
                .materialize(schema, std::slice::from_ref(&record), &bag)
                .await?
                .into_iter()
                .next(),
            None => {
                crate::debug_log!(uid = uid, id = %id, "findOne: no entity");
                None
            }
        };

        let wrapped = self
            .wrap_result(uid, Action::FindOne, WrappedResult::Entity(entity))
            .await?;
        Ok(wrapped.into_entity())
    }

    /// One page of entities with page-based metadata
    pub async fn find_page(
        &self,
        uid: &str,
        params: Value,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        self.find_page_as(uid, Action::FindPage, params).await
    }

    /// Legacy alias of [`find_page`](Self::find_page)
    pub async fn find_with_relation_counts_page(
        &self,
        uid: &str,
        params: Value,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        self.find_page_as(uid, Action::FindWithRelationCountsPage, params)
            .await
    }

    async fn find_page_as(
        &self,
        uid: &str,
        action: Action,
        params: Value,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        let (schema, bag) = self.prepare(uid, action, allowed::FIND_PAGE, params).await?;
        let page = self.find_paginated(schema, &bag).await?;
        let meta = page.pagination;
        let wrapped = self.wrap_result(uid, action, WrappedResult::Page(page)).await?;
        Ok(wrapped.into_page(meta))
    }

    /// Number of entities matching `filters` / `_q`
    pub async fn count(&self, uid: &str, params: Value) -> Result<u64, EntityServiceError> {
        let (schema, bag) = self
            .prepare(uid, Action::Count, allowed::COUNT, params)
            .await?;
        let descriptor = QueryDescriptor::for_params(schema, &bag)
            .fields(Some(Vec::new()))
            .limit(0);
        let outcome = self.storage.execute(uid, &descriptor).await?;
        Ok(outcome.total)
    }
}

