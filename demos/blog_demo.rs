//! # Blog Demo
//!
//! Walks through the entity service over the in-memory storage engine:
//! - Loading content-type schemas from a directory
//! - Subscribing to lifecycle events
//! - Creating, querying, populating and paginating entities
//! - Deferred relation loading and polymorphic relations

use entityhaus::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("📰 EntityHaus Blog Demo");
    println!("=======================");

    // 1. Schemas and storage
    let registry = load_schema_dir("demos/schemas")?;
    println!("✅ Loaded content types: {:?}", registry.uids());

    let storage = Arc::new(InMemoryStorage::new(Arc::new(registry.clone())));
    let haus = EntityHaus::new(AppConfig::load()?, registry, storage)?;

    // 2. Lifecycle events
    haus.on_event("*", None, |event| async move {
        println!("   📣 {} {} #{}", event.event_name(), event.uid, event.entity.id);
        Ok(())
    })?;

    let service = haus.entity_service();

    // 3. Creating entities
    println!("\n✍️  Creating content");
    println!("-------------------");
    let ada = service
        .create("user", json!({"data": {"name": "Ada", "email": "ada@example.com"}}))
        .await?;
    let grace = service
        .create("user", json!({"data": {"name": "Grace", "role": "editor"}}))
        .await?;
    let rust = service.create("tag", json!({"data": {"label": "rust"}})).await?;
    let web = service.create("tag", json!({"data": {"label": "web"}})).await?;
    let cover = service
        .create("media", json!({"data": {"url": "/cover.png", "alt": "Cover"}}))
        .await?;

    for (title, author, published) in [
        ("Ownership in practice", &ada, true),
        ("Async all the way down", &grace, true),
        ("Unfinished thoughts", &ada, false),
    ] {
        service
            .create(
                "article",
                json!({"data": {
                    "title": title,
                    "author": author.id.to_value(),
                    "tags": [rust.id.to_value(), web.id.to_value()],
                    "blocks": [
                        {"__type": "media", "id": cover.id.to_value()},
                        {"__type": "tag", "id": web.id.to_value()}
                    ],
                    "published_at": if published { json!("2024-05-01T08:00:00Z") } else { Value::Null },
                }}),
            )
            .await?;
    }
    haus.flush_events().await;

    // 4. Querying with filters, sort and population
    println!("\n🔍 Published articles by Ada");
    println!("---------------------------");
    let articles = service
        .find_many(
            "article",
            json!({
                "fields": ["title"],
                "filters": {"author": {"name": {"$eqi": "ada"}}},
                "sort": "title:asc",
                "populate": {"author": {"fields": ["name"]}, "tags": {"count": true}}
            }),
        )
        .await?;
    for article in articles.into_vec() {
        println!("   {}", article.to_json());
    }

    println!("\n👀 Preview including drafts: {} articles", {
        service
            .find_many("article", json!({"publicationState": "preview"}))
            .await?
            .len()
    });

    // 5. Pagination
    println!("\n📄 Page 1 of 1-article pages");
    println!("----------------------------");
    let page = service
        .find_page("article", json!({"pagination": {"page": 1, "pageSize": 1}, "fields": ["title"]}))
        .await?;
    println!("   {}", serde_json::to_string(&page)?);

    // 6. Polymorphic relations and deferred loading
    println!("\n🧩 Blocks of the first article");
    println!("------------------------------");
    let first = service
        .find_one(
            "article",
            1,
            json!({"fields": ["title"], "populate": {"blocks": {"on": {
                "media": {"fields": ["url"]},
                "tag": {"fields": ["label"]}
            }}}}),
        )
        .await?;
    if let Some(first) = first {
        println!("   {}", first.to_json());

        let author = service.load("article", &first, "author", Value::Null).await?;
        println!("   author: {}", serde_json::to_string(&author)?);

        let tags = service
            .load_pages("article", &first, "tags", Value::Null, json!({"pageSize": 1}))
            .await?;
        println!("   tags page: {}", serde_json::to_string(&tags)?);
    }

    // 7. Mutations
    println!("\n🛠  Updating, cloning and deleting");
    println!("---------------------------------");
    service
        .update("article", 3, json!({"data": {"published_at": "2024-06-01T00:00:00Z"}}))
        .await?;
    let copy = service
        .clone_entity("article", 1, json!({"data": {"title": "Ownership in practice (2nd ed.)"}}))
        .await?;
    println!("   cloned into #{}", copy.id);
    let removed = service.delete("article", 2, Value::Null).await?;
    println!("   deleted: {}", removed.is_some());
    println!("   missing delete: {:?}", service.delete("article", 999, Value::Null).await?);
    haus.flush_events().await;

    println!("\n📊 {} articles remain", service.count("article", Value::Null).await?);
    println!("📈 Signal stats: {:?}", haus.signal_manager().stats());

    Ok(())
}
