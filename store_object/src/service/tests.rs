use super::*;
use crate::errors::EntityServiceError;
use crate::pagination::PaginationMeta;
use crate::schema::{AttributeDefinition, Cardinality};
use crate::storage::InMemoryStorage;
use crate::wrapper::{EntityWrapper, WrapContext};
use serde_json::json;
use type_mapping::{AttributeType, RelationValue};

const PUBLISHED: &str = "2024-01-01T00:00:00.000Z";

fn registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register(
            ContentTypeSchema::collection("user")
                .attribute(
                    "name",
                    AttributeDefinition::scalar(AttributeType::String).required(),
                )
                .attribute("email", AttributeDefinition::scalar(AttributeType::Email)),
        )
        .register(
            ContentTypeSchema::collection("tag")
                .attribute("label", AttributeDefinition::scalar(AttributeType::String)),
        )
        .register(
            ContentTypeSchema::collection("article")
                .with_draft_and_publish()
                .attribute(
                    "title",
                    AttributeDefinition::scalar(AttributeType::String).required(),
                )
                .attribute(
                    "status",
                    AttributeDefinition::scalar(AttributeType::String)
                        .with_default(json!("draft")),
                )
                .attribute("views", AttributeDefinition::scalar(AttributeType::Integer))
                .attribute("author", AttributeDefinition::relation("user", Cardinality::One))
                .attribute("tags", AttributeDefinition::relation("tag", Cardinality::Many))
                .attribute(
                    "attachments",
                    AttributeDefinition::morph(["user", "tag"], Cardinality::Many),
                ),
        )
        .register(
            ContentTypeSchema::single("homepage")
                .attribute("headline", AttributeDefinition::scalar(AttributeType::String)),
        )
        .build()
        .unwrap()
}

fn service() -> (EntityService, Arc<InMemoryStorage>) {
    let registry = Arc::new(registry());
    let storage = Arc::new(InMemoryStorage::new(registry.clone()));

    storage.seed_with_id("user", 7, json!({"name": "Ada", "email": "ada@example.com"})).unwrap();
    storage.seed_with_id("user", 8, json!({"name": "Grace"})).unwrap();
    storage.seed_with_id("tag", 1, json!({"label": "rust"})).unwrap();
    storage.seed_with_id("tag", 2, json!({"label": "async"})).unwrap();
    storage.seed_with_id("tag", 3, json!({"label": "web"})).unwrap();
    storage
        .seed_with_id(
            "article",
            1,
            json!({
                "title": "Ownership",
                "status": "live",
                "views": 10,
                "author": 7,
                "tags": [2, 1],
                "attachments": [{"__type": "tag", "id": 3}, {"__type": "user", "id": 8}],
                "published_at": PUBLISHED,
            }),
        )
        .unwrap();
    storage
        .seed_with_id(
            "article",
            2,
            json!({"title": "Draft", "status": "draft", "author": 8, "tags": [], "published_at": null}),
        )
        .unwrap();
    storage
        .seed_with_id(
            "article",
            3,
            json!({"title": "Lifetimes", "views": 30, "author": 7, "tags": [3], "published_at": PUBLISHED}),
        )
        .unwrap();
    storage.seed_with_id("homepage", 1, json!({"headline": "Welcome"})).unwrap();

    let service = EntityService::new(registry, storage.clone(), PaginationConfig::default());
    (service, storage)
}

fn ids(entities: &[Entity]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id.clone()).collect()
}

#[tokio::test]
async fn test_find_many_live_by_default() {
    let (service, _) = service();

    let live = service.find_many("article", Value::Null).await.unwrap();
    assert_eq!(ids(&live.into_vec()), vec![EntityId::from(1), EntityId::from(3)]);

    let preview = service
        .find_many("article", json!({"publicationState": "preview", "sort": "id:desc"}))
        .await
        .unwrap();
    assert_eq!(
        ids(&preview.into_vec()),
        vec![EntityId::from(3), EntityId::from(2), EntityId::from(1)]
    );
}

#[tokio::test]
async fn test_find_many_single_type() {
    let (service, _) = service();
    let result = service.find_many("homepage", Value::Null).await.unwrap();
    match result {
        FindManyResult::Single(Some(entity)) => {
            assert_eq!(entity.scalar("headline"), Some(&json!("Welcome")))
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_find_one_populates_selected_fields() {
    let (service, _) = service();
    let article = service
        .find_one(
            "article",
            1,
            json!({"fields": ["title"], "populate": {"author": {"fields": ["name"]}}}),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        article.to_json(),
        json!({"id": 1, "title": "Ownership", "author": {"id": 7, "name": "Ada"}})
    );
    assert!(service.find_one("article", 99, Value::Null).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_one_ignores_publication_state() {
    let (service, _) = service();
    let draft = service.find_one("article", 2, Value::Null).await.unwrap();
    assert!(draft.is_some());

    let err = service
        .find_one("article", 2, json!({"publicationState": "live"}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("publicationState"));
}

#[tokio::test]
async fn test_populate_relation_order_and_count() {
    let (service, _) = service();
    let article = service
        .find_one("article", 1, json!({"populate": {"tags": {"fields": ["label"]}}}))
        .await
        .unwrap()
        .unwrap();
    let tags = article.relation("tags").unwrap();
    let labels: Vec<_> = tags.entities().iter().map(|t| t.scalar("label").cloned()).collect();
    assert_eq!(labels, vec![Some(json!("async")), Some(json!("rust"))]);

    let counted = service
        .find_many("article", json!({"populate": {"tags": {"count": true}}, "sort": "id"}))
        .await
        .unwrap()
        .into_vec();
    assert_eq!(counted[0].relation("tags"), Some(&RelationValue::Count { count: 2 }));
    assert_eq!(counted[1].relation("tags"), Some(&RelationValue::Count { count: 1 }));
}

#[tokio::test]
async fn test_morph_fragments_shape_per_target() {
    let (service, _) = service();
    let article = service
        .find_one(
            "article",
            1,
            json!({"populate": {"attachments": {"on": {
                "tag": {"fields": ["label"]},
                "user": {"fields": ["email"]}
            }}}}),
        )
        .await
        .unwrap()
        .unwrap();

    let attachments = article.relation("attachments").unwrap().to_owned();
    let json = serde_json::to_value(&attachments).unwrap();
    assert_eq!(
        json,
        json!([
            {"id": 3, "label": "web", "__type": "tag"},
            {"id": 8, "email": null, "__type": "user"}
        ])
    );
}

#[tokio::test]
async fn test_find_page_meta() {
    let (service, _) = service();
    let page = service
        .find_page(
            "article",
            json!({"pagination": {"page": 2, "pageSize": 1}, "publicationState": "preview"}),
        )
        .await
        .unwrap();

    assert_eq!(ids(&page.results), vec![EntityId::from(2)]);
    assert_eq!(
        page.pagination,
        PaginationMeta::Page {
            page: 2,
            page_size: 1,
            page_count: Some(3),
            total: Some(3)
        }
    );

    let legacy = service
        .find_with_relation_counts_page("article", json!({"pagination": {"pageSize": 1}}))
        .await
        .unwrap();
    assert_eq!(legacy.pagination.total(), Some(2));
}

#[tokio::test]
async fn test_count_applies_filters() {
    let (service, _) = service();
    assert_eq!(service.count("article", Value::Null).await.unwrap(), 3);
    assert_eq!(
        service
            .count("article", json!({"filters": {"author": {"name": "Ada"}}}))
            .await
            .unwrap(),
        2
    );
    assert_eq!(service.count("article", json!({"_q": "own"})).await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_applies_defaults_and_required() {
    let (service, storage) = service();
    let created = service
        .create("article", json!({"data": {"title": "New", "tags": [1, 3]}, "populate": ["tags"]}))
        .await
        .unwrap();

    assert_eq!(created.id, EntityId::from(4));
    assert_eq!(created.scalar("status"), Some(&json!("draft")));
    assert_eq!(created.relation("tags").unwrap().entities().len(), 2);
    assert_eq!(storage.len("article"), 4);

    let err = service
        .create("article", json!({"data": {"views": 1}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("data.title"));
    assert_eq!(storage.len("article"), 4);
}

#[tokio::test]
async fn test_update_and_delete_missing_return_none() {
    let (service, storage) = service();
    assert!(service
        .update("article", 42, json!({"data": {"views": 1}}))
        .await
        .unwrap()
        .is_none());
    assert!(service.delete("article", 42, Value::Null).await.unwrap().is_none());

    let updated = service
        .update("article", 2, json!({"data": {"views": 5}}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.scalar("views"), Some(&json!(5)));
    assert_eq!(updated.scalar("title"), Some(&json!("Draft")));

    let err = service
        .update("article", 2, json!({"data": {"title": null}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("data.title"));

    let deleted = service
        .delete("article", 3, json!({"populate": ["author"]}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        deleted.relation("author").and_then(|a| a.entities().first().map(|e| e.id.clone())),
        Some(EntityId::from(7))
    );
    assert_eq!(storage.len("article"), 2);
}

#[tokio::test]
async fn test_clone_merges_overrides() {
    let (service, storage) = service();
    let copy = service
        .clone_entity("article", 1, json!({"data": {"title": "Ownership (copy)"}}))
        .await
        .unwrap();

    assert_eq!(copy.scalar("title"), Some(&json!("Ownership (copy)")));
    assert_eq!(copy.scalar("views"), Some(&json!(10)));
    let row = storage.row("article", &copy.id).unwrap();
    assert_eq!(row.get("tags"), Some(&json!([2, 1])));

    let err = service.clone_entity("article", 77, Value::Null).await.unwrap_err();
    assert!(matches!(err, EntityServiceError::EntityNotFound { .. }));
}

struct DiscardWrites;

#[async_trait::async_trait]
impl EntityWrapper for DiscardWrites {
    async fn wrap_result(
        &self,
        result: WrappedResult,
        ctx: &WrapContext<'_>,
    ) -> Result<WrappedResult, EntityServiceError> {
        match ctx.action {
            Action::Update | Action::Delete => Ok(WrappedResult::Entity(None)),
            _ => Ok(result),
        }
    }
}

#[tokio::test]
async fn test_discarded_mutation_result_is_an_error() {
    let (mut service, storage) = service();
    service.wrappers_mut().add_for("article", Arc::new(DiscardWrites));

    let err = service
        .update("article", 2, json!({"data": {"views": 5}}))
        .await
        .unwrap_err();
    assert!(matches!(err, EntityServiceError::Storage(_)));
    let stored = service.find_one("article", 2, Value::Null).await.unwrap().unwrap();
    assert_eq!(stored.scalar("views"), Some(&json!(5)));

    let err = service.delete("article", 3, Value::Null).await.unwrap_err();
    assert!(matches!(err, EntityServiceError::Storage(_)));
    assert_eq!(storage.len("article"), 2);

    assert!(service
        .update("article", 42, json!({"data": {"views": 1}}))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_delete_many_by_filter() {
    let (service, storage) = service();
    let result = service
        .delete_many("article", json!({"filters": {"views": {"$gte": 10}}}))
        .await
        .unwrap();
    assert_eq!(result, DeleteManyResult { count: 2 });
    assert_eq!(storage.len("article"), 1);
}

#[tokio::test]
async fn test_load_relation_of_fetched_entity() {
    let (service, _) = service();
    let article = service
        .find_one("article", 1, json!({"fields": ["title"]}))
        .await
        .unwrap()
        .unwrap();

    let author = service
        .load("article", &article, "author", json!({"fields": ["name"]}))
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_value(&author).unwrap(),
        json!({"id": 7, "name": "Ada"})
    );

    let err = service
        .load("article", &article, "title", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, EntityServiceError::InvalidPopulate { .. }));

    let missing = Entity::new(50);
    let err = service.load("article", &missing, "author", Value::Null).await.unwrap_err();
    assert!(matches!(err, EntityServiceError::EntityNotFound { .. }));
}

#[tokio::test]
async fn test_load_pages_relation_and_morph() {
    let (service, _) = service();
    let article = Entity::new(1);

    let page = service
        .load_pages("article", &article, "tags", Value::Null, json!({"page": 1, "pageSize": 1}))
        .await
        .unwrap();
    assert_eq!(ids(&page.results), vec![EntityId::from(2)]);
    assert_eq!(page.pagination.total(), Some(2));

    let sorted = service
        .load_pages("article", &article, "tags", json!({"sort": "label"}), Value::Null)
        .await
        .unwrap();
    assert_eq!(ids(&sorted.results), vec![EntityId::from(2), EntityId::from(1)]);

    let morph = service
        .load_pages("article", &article, "attachments", Value::Null, json!({"start": 1, "limit": 1}))
        .await
        .unwrap();
    assert_eq!(morph.results.len(), 1);
    assert_eq!(morph.results[0].scalar("__type"), Some(&json!("user")));

    let err = service
        .load_pages("article", &article, "author", Value::Null, Value::Null)
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("author"));
}

struct CountingLoads;

#[async_trait::async_trait]
impl EntityWrapper for CountingLoads {
    async fn wrap_params(
        &self,
        params: Value,
        ctx: &WrapContext<'_>,
    ) -> Result<Value, EntityServiceError> {
        if ctx.action != Action::LoadPages {
            return Ok(params);
        }
        let mut params = params.as_object().cloned().unwrap_or_default();
        params.insert("count".to_string(), json!(true));
        Ok(Value::Object(params))
    }
}

#[tokio::test]
async fn test_load_pages_rejects_count_added_by_wrappers() {
    let (mut service, _) = service();
    service.wrappers_mut().add(Arc::new(CountingLoads));
    let article = Entity::new(1);

    for field in ["tags", "attachments"] {
        let err = service
            .load_pages("article", &article, field, Value::Null, Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.path(), Some("count"), "{}", field);
    }

    let tags = service
        .load("article", &article, "tags", Value::Null)
        .await
        .unwrap();
    assert!(matches!(tags, RelationValue::Many(ref loaded) if loaded.len() == 2));
}

#[tokio::test]
async fn test_unknown_content_type() {
    let (service, _) = service();
    let err = service.find_many("api::missing.missing", Value::Null).await.unwrap_err();
    assert!(matches!(err, EntityServiceError::SchemaNotFound(uid) if uid == "api::missing.missing"));
}
