// Schema definitions are rejected with errors, never panics
use serde_json::json;
use store_object::*;
use type_mapping::AttributeType;

fn main() {
    println!("Checking schema validation...");

    // Test 1: Invalid identifiers should return errors
    let invalid_uids = ["", "1article", "api article", &"a".repeat(256)];
    for uid in invalid_uids {
        match ValidatedUid::new(uid) {
            Ok(_) => println!("❌ Unexpectedly accepted uid: {:?}", uid),
            Err(e) => println!("✅ Rejected uid {:?}: {}", uid, e),
        }
    }

    let invalid_attributes = ["id", "__type", "first-name", "9lives"];
    for name in invalid_attributes {
        match ValidatedAttributeName::new(name) {
            Ok(_) => println!("❌ Unexpectedly accepted attribute: {}", name),
            Err(e) => println!("✅ Rejected attribute '{}': {}", name, e),
        }
    }

    // Test 2: Registry construction catches dangling relations
    let dangling = SchemaRegistry::builder()
        .register(
            ContentTypeSchema::collection("api::article.article")
                .attribute("author", AttributeDefinition::relation("api::user.user", Cardinality::One)),
        )
        .build();
    match dangling {
        Ok(_) => println!("❌ Unexpectedly built a registry with an unknown target"),
        Err(e) => println!("✅ Rejected registry: {}", e),
    }

    // Test 3: Schema documents with bad attribute types
    let document = json!({
        "uid": "api::page.page",
        "kind": "singleType",
        "attributes": {"title": {"type": "headline"}}
    });
    match ContentTypeSchema::from_json(&document) {
        Ok(_) => println!("❌ Unexpectedly parsed an unknown attribute type"),
        Err(e) => println!("✅ Rejected document: {}", e),
    }

    // Test 4: A valid registry
    let registry = SchemaRegistry::builder()
        .register(
            ContentTypeSchema::collection("api::user.user")
                .attribute("name", AttributeDefinition::scalar(AttributeType::String).required()),
        )
        .register(
            ContentTypeSchema::collection("api::article.article")
                .with_draft_and_publish()
                .attribute("author", AttributeDefinition::relation("api::user.user", Cardinality::One)),
        )
        .build();
    match registry {
        Ok(registry) => println!("✅ Registry with content types {:?}", registry.uids()),
        Err(e) => println!("❌ Unexpectedly rejected a valid registry: {}", e),
    }
}
