use futures::future::ready;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use type_mapping::{Entity, EntityId, RelationValue};

use super::EntityService;
use crate::errors::EntityServiceError;
use crate::pagination::{paginate, PaginatedResult};
use crate::params::pagination::parse_paged;
use crate::params::{allowed, FilterExpression, PaginationSpec, ParamsBag};
use crate::populate::loader::{load_step, morph_refs, related_ids};
use crate::populate::{self, PopulateSpec, PopulationStep};
use crate::schema::{AttributeDefinition, Cardinality, ContentTypeSchema};
use crate::shape::TYPE_KEY;
use crate::storage::{QueryDescriptor, RawRecord};
use crate::wrapper::{Action, WrappedResult};

impl EntityService {
    /// Populate a single relation of an already fetched entity.
    ///
    /// `params` takes the same form as a nested populate entry
    /// (`fields`, `filters`, `sort`, `populate`, `count`, `publicationState`, or `on`).
    pub async fn load(
        &self,
        uid: &str,
        entity: &Entity,
        field: &str,
        params: Value,
    ) -> Result<RelationValue, EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let params = self.wrap_params(uid, Action::Load, params).await?;
        let step = self.relation_step(schema, field, params)?;
        let parent = self.parent_record(schema, &entity.id, field).await?;

        let ctx = self.populate_context();
        let value = load_step(&ctx, std::slice::from_ref(&parent), &step)
            .await?
            .into_iter()
            .next()
            .unwrap_or(RelationValue::Many(Vec::new()));

        let wrapped = self
            .wrap_result(uid, Action::Load, WrappedResult::Relation(value))
            .await?;
        Ok(wrapped.into_relation())
    }

    /// Page through a to-many relation of an already fetched entity.
    ///
    /// `pagination` accepts `page`/`pageSize` or `start`/`limit`; absent means the first page.
    /// Only the requested window is read from storage.
    pub async fn load_pages(
        &self,
        uid: &str,
        entity: &Entity,
        field: &str,
        params: Value,
        pagination: Value,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let definition = schema.attribute_def(field);
        if definition.and_then(AttributeDefinition::cardinality) != Some(Cardinality::Many) {
            return Err(EntityServiceError::invalid_parameter(
                field,
                format!("'{}' is not a to-many relation of {}", field, uid),
            ));
        }

        let params = self.wrap_params(uid, Action::LoadPages, params).await?;
        let spec = parse_paged(
            (!pagination.is_null()).then_some(&pagination),
            &self.config,
            "pagination",
        )?;

        let page = match definition {
            Some(AttributeDefinition::Relation { target, .. }) => {
                let target_schema = self.registry.get(target)?;
                let params = self
                    .normalizer()
                    .normalize(target, allowed::LOAD_PAGES, &params)?;
                let parent = self.parent_record(schema, &entity.id, field).await?;
                let ids = related_ids(parent.get(field));
                self.relation_page(target_schema, &params, ids, &spec).await?
            }
            _ => {
                if params.get("count").is_some() {
                    return Err(EntityServiceError::invalid_parameter(
                        "count",
                        "parameter is not accepted by this operation",
                    ));
                }
                let step = self.relation_step(schema, field, params)?;
                let parent = self.parent_record(schema, &entity.id, field).await?;
                self.morph_page(&parent, &step, &spec).await?
            }
        };

        let meta = page.pagination;
        let wrapped = self
            .wrap_result(uid, Action::LoadPages, WrappedResult::Page(page))
            .await?;
        Ok(wrapped.into_page(meta))
    }

    /// One window of the plain relation `ids`.
    ///
    /// A sorted relation pushes the window into the storage query. Otherwise the
    /// window is taken over relation order and only its members are fetched.
    async fn relation_page(
        &self,
        target: &ContentTypeSchema,
        params: &ParamsBag,
        ids: Vec<EntityId>,
        spec: &PaginationSpec,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        let descriptor =
            QueryDescriptor::for_params(target, params).filter(FilterExpression::id_in(&ids));

        let page = if !params.sort.is_empty() && !ids.is_empty() {
            paginate(spec, &self.config, |offset, limit| {
                let query = descriptor.clone().window(offset, limit);
                async move {
                    let outcome = self.storage.execute(&target.uid, &query).await?;
                    Ok::<_, EntityServiceError>((outcome.records, outcome.total))
                }
            })
            .await?
        } else {
            let ids = if QueryDescriptor::for_params(target, params).filters.is_none() {
                ids
            } else {
                self.matching_ids(target, descriptor, &ids).await?
            };
            let total = ids.len() as u64;
            paginate(spec, &self.config, |offset, limit| {
                let slice = window_of(&ids, offset, limit).to_vec();
                async move {
                    let records = self.fetch_in_order(target, params, &slice).await?;
                    Ok::<_, EntityServiceError>((records, total))
                }
            })
            .await?
        };

        let results = self.materialize(target, &page.results, params).await?;
        Ok(PaginatedResult {
            results,
            pagination: page.pagination,
        })
    }

    /// Members of `ids` matched by `descriptor`, in relation order
    async fn matching_ids(
        &self,
        target: &ContentTypeSchema,
        descriptor: QueryDescriptor,
        ids: &[EntityId],
    ) -> Result<Vec<EntityId>, EntityServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let descriptor = descriptor.fields(Some(Vec::new()));
        let matched: HashSet<EntityId> = self
            .storage
            .execute(&target.uid, &descriptor)
            .await?
            .records
            .into_iter()
            .map(|record| record.id)
            .collect();
        Ok(ids.iter().filter(|id| matched.contains(*id)).cloned().collect())
    }

    /// Records for `ids`, ordered like `ids`
    async fn fetch_in_order(
        &self,
        target: &ContentTypeSchema,
        params: &ParamsBag,
        ids: &[EntityId],
    ) -> Result<Vec<RawRecord>, EntityServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let descriptor = QueryDescriptor::for_params(target, params)
            .filter(FilterExpression::id_in(ids))
            .limit(ids.len() as u64);
        let mut records = self.storage.execute(&target.uid, &descriptor).await?.records;

        let position: HashMap<&EntityId, usize> =
            ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
        records.sort_by_key(|record| position.get(&record.id).copied());
        Ok(records)
    }

    /// One window of a morph relation; each page member is loaded from its own type
    async fn morph_page(
        &self,
        parent: &RawRecord,
        step: &PopulationStep,
        spec: &PaginationSpec,
    ) -> Result<PaginatedResult<Entity>, EntityServiceError> {
        let field = step.field.as_str();
        let refs = morph_refs(parent.get(field));
        let total = refs.len() as u64;
        let window = paginate(spec, &self.config, |offset, limit| {
            let slice = window_of(&refs, offset, limit).to_vec();
            ready(Ok((slice, total)))
        })
        .await?;

        let stored: Vec<Value> = window
            .results
            .iter()
            .map(|(target, id)| json!({ TYPE_KEY: target, "id": id.to_value() }))
            .collect();
        let mut values = Map::new();
        values.insert(field.to_string(), Value::Array(stored));
        let holder = RawRecord::new(parent.id.clone(), values);

        let ctx = self.populate_context();
        let loaded = load_step(&ctx, std::slice::from_ref(&holder), step).await?;
        let results = match loaded.into_iter().next() {
            Some(RelationValue::Many(entities)) => entities,
            Some(other) => other.entities().into_iter().cloned().collect(),
            None => Vec::new(),
        };
        Ok(PaginatedResult {
            results,
            pagination: window.pagination,
        })
    }

    /// Resolve `{field: params}` into the population step for `field`
    fn relation_step(
        &self,
        schema: &ContentTypeSchema,
        field: &str,
        params: Value,
    ) -> Result<PopulationStep, EntityServiceError> {
        match schema.attribute_def(field) {
            Some(definition) if definition.is_relation() => {}
            Some(_) => {
                return Err(EntityServiceError::invalid_populate(
                    field,
                    format!("'{}' is not a relation", field),
                ))
            }
            None => {
                return Err(EntityServiceError::invalid_populate(
                    field,
                    format!("unknown attribute '{}' on {}", field, schema.uid),
                ))
            }
        }

        let nested = if params.is_null() { Value::Bool(true) } else { params };
        let mut raw = Map::new();
        raw.insert(field.to_string(), nested);
        let spec = PopulateSpec::parse(&Value::Object(raw), "")?.ok_or_else(|| {
            EntityServiceError::invalid_populate(field, "relation is not populated")
        })?;

        populate::resolve(&self.normalizer(), &schema.uid, &spec, "")?
            .into_iter()
            .find(|step| step.field == field)
            .ok_or_else(|| EntityServiceError::invalid_populate(field, "relation is not populated"))
    }

    /// Stored relation value of `field` on entity `id`
    async fn parent_record(
        &self,
        schema: &ContentTypeSchema,
        id: &EntityId,
        field: &str,
    ) -> Result<RawRecord, EntityServiceError> {
        let descriptor = QueryDescriptor::new()
            .filter(FilterExpression::id_eq(id))
            .fields(Some(vec![field.to_string()]))
            .limit(1);
        self.storage
            .execute(&schema.uid, &descriptor)
            .await?
            .records
            .into_iter()
            .next()
            .ok_or_else(|| EntityServiceError::not_found(&schema.uid, id))
    }
}

fn window_of<T>(items: &[T], offset: u64, limit: u64) -> &[T] {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(items.len());
    let end = usize::try_from(offset.saturating_add(limit))
        .unwrap_or(usize::MAX)
        .min(items.len());
    &items[start..end]
}
