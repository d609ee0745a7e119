//! Parameter and result wrappers
//!
//! Every operation passes its raw parameters through the registered wrappers
//! before normalization, and its result through them before returning.
//! Global wrappers run first, then wrappers registered for the content type.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use type_mapping::{Entity, RelationValue};

use crate::errors::EntityServiceError;
use crate::pagination::{PaginatedResult, PaginationMeta};
use crate::schema::ContentTypeSchema;

/// Entity service operations, as seen by wrappers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FindMany,
    FindOne,
    FindPage,
    FindWithRelationCounts,
    FindWithRelationCountsPage,
    Create,
    Update,
    Delete,
    DeleteMany,
    Clone,
    Count,
    Load,
    LoadPages,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::FindMany => "findMany",
            Action::FindOne => "findOne",
            Action::FindPage => "findPage",
            Action::FindWithRelationCounts => "findWithRelationCounts",
            Action::FindWithRelationCountsPage => "findWithRelationCountsPage",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::DeleteMany => "deleteMany",
            Action::Clone => "clone",
            Action::Count => "count",
            Action::Load => "load",
            Action::LoadPages => "loadPages",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a wrapper is invoked for
#[derive(Debug, Clone, Copy)]
pub struct WrapContext<'a> {
    pub uid: &'a str,
    pub action: Action,
    pub schema: &'a ContentTypeSchema,
}

/// Operation result handed to `wrap_result`
#[derive(Debug, Clone, PartialEq)]
pub enum WrappedResult {
    Entity(Option<Entity>),
    Entities(Vec<Entity>),
    Page(PaginatedResult<Entity>),
    Relation(RelationValue),
}

impl WrappedResult {
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            WrappedResult::Entity(entity) => entity,
            other => other.into_entities().into_iter().next(),
        }
    }

    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            WrappedResult::Entity(entity) => entity.into_iter().collect(),
            WrappedResult::Entities(entities) => entities,
            WrappedResult::Page(page) => page.results,
            WrappedResult::Relation(RelationValue::One(entity)) => {
                entity.map(|e| *e).into_iter().collect()
            }
            WrappedResult::Relation(RelationValue::Many(entities)) => entities,
            WrappedResult::Relation(RelationValue::Count { .. }) => Vec::new(),
        }
    }

    /// Page result; other shapes keep `pagination`
    pub fn into_page(self, pagination: PaginationMeta) -> PaginatedResult<Entity> {
        match self {
            WrappedResult::Page(page) => page,
            other => PaginatedResult {
                results: other.into_entities(),
                pagination,
            },
        }
    }

    pub fn into_relation(self) -> RelationValue {
        match self {
            WrappedResult::Relation(relation) => relation,
            WrappedResult::Entity(entity) => RelationValue::One(entity.map(Box::new)),
            other => RelationValue::Many(other.into_entities()),
        }
    }
}

/// Hook around entity service operations; both methods default to identity
#[async_trait]
pub trait EntityWrapper: Send + Sync {
    async fn wrap_params(
        &self,
        params: Value,
        _ctx: &WrapContext<'_>,
    ) -> Result<Value, EntityServiceError> {
        Ok(params)
    }

    async fn wrap_result(
        &self,
        result: WrappedResult,
        _ctx: &WrapContext<'_>,
    ) -> Result<WrappedResult, EntityServiceError> {
        Ok(result)
    }
}

/// Fills declared default values into `data` on create
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValuesWrapper;

#[async_trait]
impl EntityWrapper for DefaultValuesWrapper {
    async fn wrap_params(
        &self,
        mut params: Value,
        ctx: &WrapContext<'_>,
    ) -> Result<Value, EntityServiceError> {
        if ctx.action != Action::Create {
            return Ok(params);
        }

        let defaults: Vec<(&str, &Value)> = ctx
            .schema
            .scalar_attributes()
            .filter_map(|(name, def)| def.constraints()?.default.as_ref().map(|v| (name, v)))
            .collect();
        if defaults.is_empty() {
            return Ok(params);
        }

        if params.is_null() {
            params = Value::Object(Map::new());
        }
        let Some(data) = params
            .as_object_mut()
            .map(|obj| obj.entry("data").or_insert_with(|| Value::Object(Map::new())))
            .and_then(Value::as_object_mut)
        else {
            return Ok(params);
        };

        for (name, default) in defaults {
            if !data.contains_key(name) {
                data.insert(name.to_string(), default.clone());
            }
        }
        Ok(params)
    }
}

/// Ordered wrapper chain
#[derive(Clone, Default)]
pub struct EntityWrappers {
    global: Vec<Arc<dyn EntityWrapper>>,
    per_type: HashMap<String, Vec<Arc<dyn EntityWrapper>>>,
}

impl EntityWrappers {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain holding [`DefaultValuesWrapper`]
    pub fn with_defaults() -> Self {
        let mut wrappers = Self::new();
        wrappers.add(Arc::new(DefaultValuesWrapper));
        wrappers
    }

    /// Register a wrapper for every content type
    pub fn add(&mut self, wrapper: Arc<dyn EntityWrapper>) {
        self.global.push(wrapper);
    }

    /// Register a wrapper for one content type
    pub fn add_for(&mut self, uid: impl Into<String>, wrapper: Arc<dyn EntityWrapper>) {
        self.per_type.entry(uid.into()).or_default().push(wrapper);
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.per_type.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn chain<'a>(&'a self, uid: &str) -> impl Iterator<Item = &'a Arc<dyn EntityWrapper>> + 'a {
        let scoped = self.per_type.get(uid).map(Vec::as_slice).unwrap_or_default();
        self.global.iter().chain(scoped.iter())
    }

    pub async fn wrap_params(
        &self,
        mut params: Value,
        ctx: &WrapContext<'_>,
    ) -> Result<Value, EntityServiceError> {
        for wrapper in self.chain(ctx.uid) {
            params = wrapper.wrap_params(params, ctx).await?;
        }
        Ok(params)
    }

    pub async fn wrap_result(
        &self,
        mut result: WrappedResult,
        ctx: &WrapContext<'_>,
    ) -> Result<WrappedResult, EntityServiceError> {
        for wrapper in self.chain(ctx.uid) {
            result = wrapper.wrap_result(result, ctx).await?;
        }
        Ok(result)
    }
}

impl fmt::Debug for EntityWrappers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityWrappers")
            .field("global", &self.global.len())
            .field("per_type", &self.per_type.keys().collect::<Vec<_>>())
            .finish()
    }
}
