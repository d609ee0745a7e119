//! Integration tests for the entity service operations
//!
//! Runs the façade against a counting in-memory storage engine to check
//! results, storage round trips and validation ordering.

mod common;

use common::{ids, Harness, PUBLISHED};
use entityhaus::prelude::*;
use entityhaus::store_object::PaginationMeta;

#[tokio::test]
async fn test_unknown_content_type_never_reaches_storage() {
    let h = Harness::new();
    let service = h.service();
    let uid = "api::missing.missing";
    let entity = Entity::new(1);

    let errors = vec![
        service.find_many(uid, Value::Null).await.err(),
        service.find_with_relation_counts(uid, Value::Null).await.err(),
        service.find_one(uid, 1, Value::Null).await.err(),
        service.find_page(uid, Value::Null).await.err(),
        service.find_with_relation_counts_page(uid, Value::Null).await.err(),
        service.count(uid, Value::Null).await.err(),
        service.create(uid, json!({"data": {}})).await.err(),
        service.update(uid, 1, json!({"data": {}})).await.err(),
        service.delete(uid, 1, Value::Null).await.err(),
        service.clone_entity(uid, 1, Value::Null).await.err(),
        service.delete_many(uid, Value::Null).await.err(),
        service.load(uid, &entity, "author", Value::Null).await.err(),
        service
            .load_pages(uid, &entity, "tags", Value::Null, Value::Null)
            .await
            .err(),
    ];

    for err in errors {
        assert!(
            matches!(err, Some(EntityServiceError::SchemaNotFound(ref missing)) if missing == uid),
            "unexpected outcome: {:?}",
            err
        );
    }
    assert_eq!(h.storage.calls(), 0);
    assert!(h.events().await.is_empty());
}

#[tokio::test]
async fn test_invalid_parameters_fail_before_storage() {
    let h = Harness::new();
    let service = h.service();

    let err = service
        .create("article", json!({"data": {"title": "t"}, "filters": {"id": 1}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("filters"));

    let err = service
        .find_many("article", json!({"populate": {"author": {"fields": ["nickname"]}}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("populate.author.fields"));

    let err = service
        .find_many("article", json!({"populate": ["views"]}))
        .await
        .unwrap_err();
    assert!(matches!(err, EntityServiceError::InvalidPopulate { .. }));

    let err = service
        .find_many("article", json!({"filters": {"views": {"$gt": "many"}}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("filters.views.$gt"));

    assert_eq!(h.storage.calls(), 0);
}

#[tokio::test]
async fn test_find_one_with_populated_author() {
    let h = Harness::new();
    let article = h
        .service()
        .find_one("article", 1, json!({"populate": {"author": {"fields": ["name"]}}}))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        article.to_json(),
        json!({
            "id": 1,
            "title": "Ownership",
            "views": 10,
            "published_at": PUBLISHED,
            "author": {"id": 7, "name": "Ada"}
        })
    );
    assert!(h.events().await.is_empty());
}

#[tokio::test]
async fn test_publication_state() {
    let h = Harness::new();
    let service = h.service();

    let live = service.find_many("article", json!({"sort": "id"})).await.unwrap();
    assert_eq!(ids(&live.into_vec()), vec![EntityId::from(1), EntityId::from(3), EntityId::from(4)]);

    let preview = service
        .find_many("article", json!({"sort": "id", "publicationState": "preview"}))
        .await
        .unwrap();
    assert_eq!(preview.len(), 4);

    let drafts = service
        .find_many(
            "article",
            json!({"publicationState": "preview", "filters": {"published_at": {"$null": true}}}),
        )
        .await
        .unwrap();
    assert_eq!(ids(&drafts.into_vec()), vec![EntityId::from(2)]);

    assert_eq!(service.count("article", Value::Null).await.unwrap(), 4);
}

#[tokio::test]
async fn test_filters_sort_and_offset_pagination() {
    let h = Harness::new();
    let found = h
        .service()
        .find_many(
            "article",
            json!({
                "filters": {"$or": [{"author": {"name": {"$eqi": "ada"}}}, {"views": {"$gte": 20}}]},
                "sort": [{"views": "desc"}],
                "start": 1,
                "limit": 2
            }),
        )
        .await
        .unwrap();
    assert_eq!(ids(&found.into_vec()), vec![EntityId::from(4), EntityId::from(1)]);
}

#[tokio::test]
async fn test_find_page_metadata() {
    let h = Harness::new();
    let page = h
        .service()
        .find_page("article", json!({"pagination": {"page": 2, "pageSize": 2}, "sort": "id"}))
        .await
        .unwrap();

    assert_eq!(ids(&page.results), vec![EntityId::from(4)]);
    assert_eq!(
        page.pagination,
        PaginationMeta::Page {
            page: 2,
            page_size: 2,
            page_count: Some(2),
            total: Some(3)
        }
    );
    assert_eq!(
        serde_json::to_value(&page.pagination).unwrap(),
        json!({"page": 2, "pageSize": 2, "pageCount": 2, "total": 3})
    );
}

#[tokio::test]
async fn test_page_size_is_clamped() {
    let h = Harness::new();
    let page = h
        .service()
        .find_page("article", json!({"pagination": {"pageSize": 10_000}}))
        .await
        .unwrap();
    assert!(matches!(page.pagination, PaginationMeta::Page { page_size: 100, .. }));
}

#[tokio::test]
async fn test_unbounded_fetch_is_chunked_and_ordered() {
    let mut config = AppConfig::default();
    config.pagination = PaginationConfig::new(25, 100, 2, true);
    let h = Harness::with_config(config);
    let service = h.service();

    let params = json!({"sort": "views:desc", "publicationState": "preview"});
    let all = service.find_many("article", params).await.unwrap().into_vec();
    assert_eq!(h.storage.reads(), 2);
    assert_eq!(ids(&all), vec![EntityId::from(3), EntityId::from(4), EntityId::from(1), EntityId::from(2)]);

    let single_call = service
        .find_many(
            "article",
            json!({"sort": "views:desc", "publicationState": "preview", "limit": 4}),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(all, single_call);

    h.storage.reset_counts();
    let unlimited = service
        .find_many("article", json!({"limit": -1}))
        .await
        .unwrap();
    assert_eq!(unlimited.len(), 3);
    assert_eq!(h.storage.reads(), 2);
}

#[tokio::test]
async fn test_start_without_limit_reads_the_rest() {
    let mut config = AppConfig::default();
    config.pagination = PaginationConfig::new(2, 100, 2, true);
    let h = Harness::with_config(config);
    let service = h.service();

    let rest = service
        .find_many("article", json!({"start": 1, "sort": "id", "publicationState": "preview"}))
        .await
        .unwrap()
        .into_vec();
    assert_eq!(ids(&rest), vec![EntityId::from(2), EntityId::from(3), EntityId::from(4)]);
    assert_eq!(h.storage.reads(), 2);

    let unlimited = service
        .find_many(
            "article",
            json!({"start": 1, "limit": -1, "sort": "id", "publicationState": "preview"}),
        )
        .await
        .unwrap()
        .into_vec();
    assert_eq!(unlimited, rest);
}

#[tokio::test]
async fn test_single_type_find_many() {
    let h = Harness::new();
    let home = h.service().find_many("homepage", Value::Null).await.unwrap();
    match home {
        FindManyResult::Single(Some(entity)) => {
            assert_eq!(entity.to_json(), json!({"id": 1, "headline": "Welcome"}))
        }
        other => panic!("expected a single entity, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_entities_are_not_errors() {
    let h = Harness::new();
    let service = h.service();

    assert!(service.find_one("article", 999, Value::Null).await.unwrap().is_none());
    assert!(service.delete("article", 999, Value::Null).await.unwrap().is_none());
    assert!(service
        .update("article", 999, json!({"data": {"views": 1}}))
        .await
        .unwrap()
        .is_none());
    assert!(h.events().await.is_empty());

    let err = service.clone_entity("article", 999, Value::Null).await.unwrap_err();
    assert!(matches!(err, EntityServiceError::EntityNotFound { ref uid, .. } if uid == "article"));
}

#[tokio::test]
async fn test_create_validates_data() {
    let h = Harness::new();
    let service = h.service();

    let err = service
        .create("user", json!({"data": {"email": "not-an-email", "name": "Bob"}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("data.email"));

    let err = service
        .create("article", json!({"data": {"views": 3}}))
        .await
        .unwrap_err();
    assert_eq!(err.path(), Some("data.title"));

    let err = service
        .create("article", json!({"data": {"title": "x", "blocks": [{"__type": "user", "id": 7}]}}))
        .await
        .unwrap_err();
    assert!(err.path().is_some_and(|p| p.starts_with("data.blocks")));

    assert_eq!(h.storage.writes(), 0);
}

#[tokio::test]
async fn test_wrapper_results_and_idempotent_params() {
    struct Slug;

    #[async_trait]
    impl EntityWrapper for Slug {
        async fn wrap_result(
            &self,
            result: WrappedResult,
            ctx: &WrapContext<'_>,
        ) -> Result<WrappedResult, EntityServiceError> {
            if ctx.action != Action::FindOne {
                return Ok(result);
            }
            Ok(WrappedResult::Entity(result.into_entity().map(|mut entity| {
                let slug = entity
                    .scalar("title")
                    .and_then(Value::as_str)
                    .map(str::to_lowercase);
                entity.set_scalar("slug", json!(slug));
                entity
            })))
        }
    }

    let mut h = Harness::new();
    h.haus
        .add_type_wrapper("article", std::sync::Arc::new(Slug))
        .unwrap();
    assert!(h
        .haus
        .add_type_wrapper("comment", std::sync::Arc::new(Slug))
        .is_err());

    let article = h
        .service()
        .find_one("article", 3, json!({"fields": ["title"]}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(article.scalar("slug"), Some(&json!("lifetimes")));

    let raw = json!({"data": {"title": "t"}});
    let once = h
        .service()
        .wrap_params("article", Action::Create, raw)
        .await
        .unwrap();
    let twice = h
        .service()
        .wrap_params("article", Action::Create, once.clone())
        .await
        .unwrap();
    assert_eq!(once, twice);
}
