//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use entityhaus::prelude::*;
use entityhaus::store_object::{QueryDescriptor, QueryOutcome, StorageError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PUBLISHED: &str = "2024-05-01T08:00:00.000Z";

/// Storage decorator counting calls, recording reads and injecting failures
pub struct CountingStorage {
    pub inner: InMemoryStorage,
    reads: AtomicUsize,
    writes: AtomicUsize,
    queries: Mutex<Vec<(String, QueryDescriptor)>>,
    fail_writes: AtomicBool,
    fail_reads_of: Mutex<Option<String>>,
}

impl CountingStorage {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            inner: InMemoryStorage::new(registry),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            fail_reads_of: Mutex::new(None),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.reads() + self.writes()
    }

    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        self.queries.lock().unwrap().clear();
    }

    /// Content types read since the last reset, in call order
    pub fn read_uids(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Descriptors of the reads of `uid` since the last reset
    pub fn queries_of(&self, uid: &str) -> Vec<QueryDescriptor> {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|(read, _)| read == uid)
            .map(|(_, query)| query.clone())
            .collect()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads_of(&self, uid: Option<&str>) {
        *self.fail_reads_of.lock().unwrap() = uid.map(str::to_string);
    }
}

#[async_trait]
impl StorageEngine for CountingStorage {
    async fn execute(&self, uid: &str, query: &QueryDescriptor) -> Result<QueryOutcome, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push((uid.to_string(), query.clone()));
        if self.fail_reads_of.lock().unwrap().as_deref() == Some(uid) {
            return Err(StorageError::new(format!("read of {} failed", uid)));
        }
        self.inner.execute(uid, query).await
    }

    async fn execute_mutation(
        &self,
        uid: &str,
        mutation: Mutation,
    ) -> Result<Option<RawRecord>, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::new(format!("{} on {} failed", mutation.name(), uid)));
        }
        self.inner.execute_mutation(uid, mutation).await
    }
}

/// Blog content model: articles by users, tagged, with polymorphic blocks
pub fn blog_registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .register(
            ContentTypeSchema::collection("user")
                .attribute("name", AttributeDefinition::scalar(AttributeType::String).required())
                .attribute("email", AttributeDefinition::scalar(AttributeType::Email))
                .attribute("avatar", AttributeDefinition::relation("media", Cardinality::One)),
        )
        .register(
            ContentTypeSchema::collection("media")
                .attribute("url", AttributeDefinition::scalar(AttributeType::String))
                .attribute("alt", AttributeDefinition::scalar(AttributeType::String)),
        )
        .register(
            ContentTypeSchema::collection("tag")
                .attribute("label", AttributeDefinition::scalar(AttributeType::String)),
        )
        .register(
            ContentTypeSchema::collection("article")
                .with_draft_and_publish()
                .attribute("title", AttributeDefinition::scalar(AttributeType::String).required())
                .attribute("views", AttributeDefinition::scalar(AttributeType::Integer))
                .attribute("author", AttributeDefinition::relation("user", Cardinality::One))
                .attribute("tags", AttributeDefinition::relation("tag", Cardinality::Many))
                .attribute(
                    "blocks",
                    AttributeDefinition::morph(["media", "tag"], Cardinality::Many),
                ),
        )
        .register(
            ContentTypeSchema::single("homepage")
                .attribute("headline", AttributeDefinition::scalar(AttributeType::String)),
        )
        .build()
        .expect("blog registry is valid")
}

/// Seeded blog data:
/// users 7 (Ada, avatar 1) and 8 (Grace); tags 1..=3; media 1..=2;
/// articles 1, 3, 4 published, article 2 a draft.
pub fn seed(storage: &InMemoryStorage) {
    let rows = [
        ("media", 1, json!({"url": "/ada.png", "alt": "Ada"})),
        ("media", 2, json!({"url": "/cover.png", "alt": "Cover"})),
        ("user", 7, json!({"name": "Ada", "email": "ada@example.com", "avatar": 1})),
        ("user", 8, json!({"name": "Grace", "email": "grace@example.com", "avatar": null})),
        ("tag", 1, json!({"label": "rust"})),
        ("tag", 2, json!({"label": "async"})),
        ("tag", 3, json!({"label": "web"})),
        (
            "article",
            1,
            json!({
                "title": "Ownership", "views": 10, "author": 7, "tags": [2, 1],
                "blocks": [{"__type": "media", "id": 2}, {"__type": "tag", "id": 3}],
                "published_at": PUBLISHED
            }),
        ),
        (
            "article",
            2,
            json!({"title": "Draft", "views": 0, "author": 8, "tags": [], "published_at": null}),
        ),
        (
            "article",
            3,
            json!({"title": "Lifetimes", "views": 30, "author": 7, "tags": [3], "published_at": PUBLISHED}),
        ),
        (
            "article",
            4,
            json!({"title": "Pinning", "views": 20, "author": 8, "tags": [1, 3], "published_at": PUBLISHED}),
        ),
    ];
    for (uid, id, values) in rows {
        storage.seed_with_id(uid, id, values).expect("seed row");
    }
    storage
        .seed_with_id("homepage", 1, json!({"headline": "Welcome"}))
        .expect("seed homepage");
}

/// Coordinator over a seeded counting storage, with every lifecycle event recorded
pub struct Harness {
    pub haus: EntityHaus,
    pub storage: Arc<CountingStorage>,
    pub events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let registry = blog_registry();
        let storage = Arc::new(CountingStorage::new(Arc::new(registry.clone())));
        seed(&storage.inner);

        let haus = EntityHaus::new(config, registry, storage.clone()).expect("coordinator");
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        haus.on_event("*", None, move |event| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(event);
                Ok(())
            }
        })
        .expect("subscribe");

        storage.reset_counts();
        Self {
            haus,
            storage,
            events,
        }
    }

    pub fn service(&self) -> &EntityService {
        self.haus.entity_service()
    }

    /// Events dispatched so far, as `(event name, uid, entity id)`
    pub async fn events(&self) -> Vec<(&'static str, String, EntityId)> {
        self.haus.flush_events().await;
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.event_name(), e.uid.clone(), e.entity.id.clone()))
            .collect()
    }
}

pub fn ids(entities: &[Entity]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id.clone()).collect()
}
