use async_trait::async_trait;

use crate::error::InventoryResult;
use crate::models::InventoryEntry;

/// Keyed store of tagged images.
///
/// Existence of an entry is the only signal used to decide whether an image
/// was already processed. `exists` followed by `put` is not atomic: two runs
/// against the same collection can both tag an image, in which case the last
/// write wins.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Whether an entry with this identifier is already stored
    async fn exists(&self, id: &str) -> InventoryResult<bool>;

    /// Insert the entry, replacing any existing one with the same identifier
    async fn put(&self, entry: InventoryEntry) -> InventoryResult<()>;

    /// Number of stored entries
    async fn count(&self) -> InventoryResult<u64>;

    /// Every stored entry
    async fn list(&self) -> InventoryResult<Vec<InventoryEntry>>;
}
