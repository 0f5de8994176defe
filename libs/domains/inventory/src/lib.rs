//! Inventory Domain
//!
//! Data model and persistence for the tagged image inventory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │ InventoryRepository │  ← exists / put / count / list (trait, mockable)
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │ MongoInventoryRepo  │  ← one document per image, keyed by `_id`
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │       Models        │  ← CandidateImage, AttributeRecord, InventoryEntry
//! └─────────────────────┘
//! ```
//!
//! [`recommend`] ranks stored entries against a user's likes and needs no
//! database.
//!
//! # Usage
//!
//! ```rust,no_run
//! use core_config::FromEnv;
//! use domain_inventory::{InventoryRepository, MongoInventoryRepository, MongoStoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MongoStoreConfig::from_env()?;
//! let repo = MongoInventoryRepository::connect(&config).await?;
//! println!("{} images tagged", repo.count().await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod mongodb;
pub mod recommend;
pub mod repository;

pub use crate::config::MongoStoreConfig;
pub use crate::error::{InventoryError, InventoryResult};
pub use crate::models::{
    Attribute, AttributeKey, AttributeRecord, CandidateImage, ImageSourceKind, InventoryEntry,
    UNSPECIFIED,
};
pub use crate::mongodb::MongoInventoryRepository;
pub use crate::recommend::{recommend, Recommendation, DEFAULT_RECOMMENDATIONS};
pub use crate::repository::InventoryRepository;

#[cfg(any(test, feature = "mock"))]
pub use crate::repository::MockInventoryRepository;
