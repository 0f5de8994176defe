//! Inventory Tagger
//!
//! Builds a tagged fashion inventory from stock photos.
//!
//! ## Architecture
//!
//! ```text
//! Pexels search (source)
//!   ↓ deduplicated CandidateImage list
//! InventoryIngestor (ingest.rs)
//!   ↓ skip if stored, else extract under the per-run quota
//! AttributeExtractor (Gemini | Cloudflare Workers AI)
//!   ↓ AttributeRecord
//! InventoryRepository (MongoDB)
//! ```
//!
//! ## Modules
//!
//! - `clients`: Backend selection and connection
//! - `config`: Environment configuration
//! - `extractor`: Image → attribute pipelines
//! - `ingest`: The run loop (quota, pacing, failure policy)
//! - `source`: Candidate image discovery

pub mod clients;
pub mod config;
pub mod extractor;
pub mod ingest;
pub mod source;

use std::time::Duration;

pub use clients::Clients;
pub use config::{Config, FailurePolicy, IngestSettings};
pub use ingest::{IngestError, IngestReport, InventoryIngestor, RunTermination};

/// Sleep for `duration`; zero returns immediately.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
