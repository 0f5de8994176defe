//! Service handles for one run
//!
//! The ingestor only sees trait objects, so backends are picked here from
//! configuration and tests can swap any of them.

use domain_inventory::{InventoryRepository, MongoInventoryRepository, MongoStoreConfig};
use eyre::{Result, WrapErr};
use reqwest::Client;
use std::time::Duration;
use tracing::info;

use crate::config::{Config, ExtractorConfig};
use crate::extractor::{AttributeExtractor, CloudflareExtractor, GeminiExtractor};
use crate::source::{ImageSource, PexelsImageSource};

pub struct Clients {
    pub source: Box<dyn ImageSource>,
    pub extractor: Box<dyn AttributeExtractor>,
    pub inventory: Box<dyn InventoryRepository>,
}

impl Clients {
    pub fn new(
        source: Box<dyn ImageSource>,
        extractor: Box<dyn AttributeExtractor>,
        inventory: Box<dyn InventoryRepository>,
    ) -> Self {
        Self {
            source,
            extractor,
            inventory,
        }
    }

    /// Build the HTTP backends and connect to the inventory store.
    pub async fn connect(config: &Config) -> Result<Self> {
        let http = build_http_client(config.http_timeout)?;

        let extractor: Box<dyn AttributeExtractor> = match &config.extractor {
            ExtractorConfig::Gemini(c) => Box::new(GeminiExtractor::new(http.clone(), c.clone())),
            ExtractorConfig::Cloudflare(c) => {
                Box::new(CloudflareExtractor::new(http.clone(), c.clone()))
            }
        };
        info!(extractor = extractor.name(), "Attribute extractor selected");

        let source = Box::new(PexelsImageSource::new(http, config.pexels.clone()));
        let inventory = Box::new(Self::connect_store(&config.store).await?);

        Ok(Self::new(source, extractor, inventory))
    }

    /// Connect to the inventory store only, for commands that make no AI calls.
    pub async fn connect_store(store: &MongoStoreConfig) -> Result<MongoInventoryRepository> {
        info!(url = %store.redacted_url(), "Connecting to inventory store...");
        MongoInventoryRepository::connect(store)
            .await
            .wrap_err("Inventory store connection failed")
    }
}

/// Shared HTTP client for the image source, image downloads and AI calls.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("inventory-tagger/", env!("CARGO_PKG_VERSION")))
        .build()
        .wrap_err("Failed to build HTTP client")
}
