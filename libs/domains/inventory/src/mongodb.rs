//! MongoDB implementation of InventoryRepository

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, CountOptions, ReplaceOptions},
    Client, Collection, Database,
};
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::MongoStoreConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::models::InventoryEntry;
use crate::repository::InventoryRepository;

/// MongoDB-backed inventory, one document per image keyed by `_id`.
pub struct MongoInventoryRepository {
    collection: Collection<InventoryEntry>,
}

impl MongoInventoryRepository {
    pub fn with_collection(db: Database, collection_name: &str) -> Self {
        let collection = db.collection::<InventoryEntry>(collection_name);
        Self { collection }
    }

    /// Connect using a [`MongoStoreConfig`] and verify the server answers a ping.
    pub async fn connect(config: &MongoStoreConfig) -> InventoryResult<Self> {
        info!(url = %config.redacted_url(), database = %config.database, "Connecting to MongoDB");

        let mut options = ClientOptions::parse(config.url.as_str()).await?;
        options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout_secs));
        if let Some(ref app_name) = config.app_name {
            options.app_name = Some(app_name.clone());
        }

        let client = Client::with_options(options)?;
        let db = client.database(&config.database);

        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| InventoryError::ConnectionFailed(e.to_string()))?;

        info!(collection = %config.collection, "Connected to MongoDB");
        Ok(Self::with_collection(db, &config.collection))
    }

    pub fn collection(&self) -> &Collection<InventoryEntry> {
        &self.collection
    }

    fn id_filter(id: &str) -> Document {
        doc! { "_id": id }
    }
}

#[async_trait]
impl InventoryRepository for MongoInventoryRepository {
    #[instrument(skip(self))]
    async fn exists(&self, id: &str) -> InventoryResult<bool> {
        let options = CountOptions::builder().limit(1).build();
        let count = self
            .collection
            .count_documents(Self::id_filter(id))
            .with_options(options)
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, entry), fields(image_id = %entry.id))]
    async fn put(&self, entry: InventoryEntry) -> InventoryResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.collection
            .replace_one(Self::id_filter(&entry.id), &entry)
            .with_options(options)
            .await?;

        tracing::debug!("Inventory entry written");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> InventoryResult<u64> {
        let count = self.collection.count_documents(doc! {}).await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> InventoryResult<Vec<InventoryEntry>> {
        let cursor = self.collection.find(doc! {}).await?;
        let entries: Vec<InventoryEntry> = cursor.try_collect().await?;
        Ok(entries)
    }
}
