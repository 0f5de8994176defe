//! Integration tests for the MongoDB inventory repository
//!
//! These run against a throwaway MongoDB container and need Docker:
//! `cargo test -p domain_inventory -- --ignored`

use domain_inventory::{
    Attribute, AttributeRecord, CandidateImage, ImageSourceKind, InventoryEntry,
    InventoryRepository, MongoInventoryRepository, MongoStoreConfig,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::mongo::Mongo;

async fn start_mongo(collection: &str) -> (ContainerAsync<Mongo>, MongoInventoryRepository) {
    let container = Mongo::default()
        .with_tag("7")
        .start()
        .await
        .expect("Failed to start MongoDB container");

    let port = container
        .get_host_port_ipv4(27017)
        .await
        .expect("Failed to get MongoDB port");

    let config = MongoStoreConfig::new(format!("mongodb://127.0.0.1:{port}"))
        .with_database("tagger_test")
        .with_collection(collection)
        .with_app_name("inventory-tagger-tests");

    let repo = MongoInventoryRepository::connect(&config)
        .await
        .expect("Failed to connect to MongoDB");

    (container, repo)
}

fn entry(id: &str, style: &str) -> InventoryEntry {
    let candidate = CandidateImage::new(id, format!("https://images.example/{id}.jpeg"));
    let attributes = AttributeRecord {
        style: Attribute::new(style),
        color: Attribute::new("Black"),
        ..Default::default()
    };
    InventoryEntry::new(&candidate, attributes, ImageSourceKind::Pexels)
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_put_then_exists() {
    let (_container, repo) = start_mongo("put_then_exists").await;

    assert!(!repo.exists("101").await.unwrap());

    repo.put(entry("101", "Casual")).await.unwrap();

    assert!(repo.exists("101").await.unwrap());
    assert!(!repo.exists("102").await.unwrap());
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_put_replaces_existing_entry() {
    let (_container, repo) = start_mongo("put_replaces").await;

    repo.put(entry("7", "Casual")).await.unwrap();
    repo.put(entry("7", "Formal")).await.unwrap();

    assert_eq!(repo.count().await.unwrap(), 1);

    let stored = repo
        .collection()
        .find_one(mongodb::bson::doc! { "_id": "7" })
        .await
        .unwrap()
        .expect("entry should exist");
    assert_eq!(stored.attributes.style.as_str(), "Formal");
    assert_eq!(stored.attributes.fitting, Attribute::Unspecified);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn test_list_returns_every_entry() {
    let (_container, repo) = start_mongo("list_all").await;

    for (id, style) in [("1", "Casual"), ("2", "Formal"), ("3", "Bohemian")] {
        repo.put(entry(id, style)).await.unwrap();
    }

    let mut ids: Vec<String> = repo.list().await.unwrap().into_iter().map(|e| e.id).collect();
    ids.sort();
    assert_eq!(ids, ["1", "2", "3"]);
}
