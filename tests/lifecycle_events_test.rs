//! Integration tests for lifecycle events emitted by mutations

mod common;

use common::Harness;
use entityhaus::prelude::*;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn test_create_emits_one_event_after_commit() {
    let h = Harness::new();
    let created = h
        .service()
        .create("article", json!({"data": {"title": "t"}}))
        .await
        .unwrap();

    assert_eq!(created.id, EntityId::from(5));
    assert_eq!(
        h.events().await,
        vec![("entry.create", "article".to_string(), EntityId::from(5))]
    );
    assert!(h.storage.inner.row("article", &created.id).is_some());
}

#[tokio::test]
async fn test_failed_mutation_emits_nothing() {
    let h = Harness::new();
    h.storage.fail_writes(true);

    let err = h
        .service()
        .create("article", json!({"data": {"title": "t"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, EntityServiceError::Storage(_)));
    assert!(err.to_string().contains("create on article failed"));

    assert!(h.service().delete("article", 1, Value::Null).await.is_err());
    assert!(h.events().await.is_empty());
}

#[tokio::test]
async fn test_update_delete_and_clone_events() {
    let h = Harness::new();
    let service = h.service();

    service
        .update("article", 2, json!({"data": {"published_at": "2024-06-01T00:00:00Z"}}))
        .await
        .unwrap()
        .unwrap();
    let copy = service
        .clone_entity("article", 1, json!({"data": {"title": "Ownership, again"}}))
        .await
        .unwrap();
    service.delete("article", 3, Value::Null).await.unwrap().unwrap();

    assert_eq!(
        h.events().await,
        vec![
            ("entry.update", "article".to_string(), EntityId::from(2)),
            ("entry.create", "article".to_string(), copy.id.clone()),
            ("entry.delete", "article".to_string(), EntityId::from(3)),
        ]
    );

    let live = service.count("article", json!({"filters": {"published_at": {"$notNull": true}}}));
    assert_eq!(live.await.unwrap(), 4);
}

#[tokio::test]
async fn test_delete_many_emits_per_item() {
    let h = Harness::new();
    let result = h
        .service()
        .delete_many("article", json!({"filters": {"author": {"id": 7}}}))
        .await
        .unwrap();
    assert_eq!(result.count, 2);

    let events = h.events().await;
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|(name, uid, _)| *name == "entry.delete" && uid == "article"));
    assert_eq!(h.service().count("article", Value::Null).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reads_emit_nothing() {
    let h = Harness::new();
    let service = h.service();
    service.find_many("article", Value::Null).await.unwrap();
    service.find_one("article", 1, Value::Null).await.unwrap();
    service.find_page("article", Value::Null).await.unwrap();
    service.count("article", Value::Null).await.unwrap();
    assert!(h.events().await.is_empty());
}

#[tokio::test]
async fn test_filtered_subscription() {
    let h = Harness::new();
    let updates = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    h.haus
        .on_event("user", Some(EventKind::Update), move |event| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(event.entity.id.clone());
                Ok(())
            }
        })
        .unwrap();

    let service = h.service();
    service.create("user", json!({"data": {"name": "Linus"}})).await.unwrap();
    service
        .update("user", 8, json!({"data": {"email": "grace@navy.mil"}}))
        .await
        .unwrap();
    service
        .update("article", 1, json!({"data": {"views": 11}}))
        .await
        .unwrap();
    h.haus.flush_events().await;

    assert_eq!(*updates.lock().unwrap(), vec![EntityId::from(8)]);
}

#[tokio::test]
async fn test_failing_subscriber_does_not_affect_caller() {
    let h = Harness::new();
    h.haus
        .on_event("*", Some(EventKind::Create), |_event| async move {
            Err::<(), _>(anyhow::anyhow!("webhook unreachable"))
        })
        .unwrap();

    let created = h
        .service()
        .create("tag", json!({"data": {"label": "ffi"}}))
        .await
        .unwrap();
    assert_eq!(created.scalar("label"), Some(&json!("ffi")));

    h.haus.flush_events().await;
    let stats = h.haus.signal_manager().stats();
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.failed, 1);
}
