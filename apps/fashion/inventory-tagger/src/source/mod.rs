//! Image sources
//!
//! A source turns a free-text query into a deduplicated list of candidate
//! images. Sources never fail outright: a transport problem ends the fetch
//! early and whatever was collected is returned.

pub mod pexels;

use async_trait::async_trait;
use domain_inventory::{CandidateImage, ImageSourceKind};
use thiserror::Error;

pub use pexels::PexelsImageSource;

/// Error type for a single source request
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    ApiError {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Trait for stock-photo search providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Provider the candidates come from
    fn kind(&self) -> ImageSourceKind;

    /// Fetch up to `limit` unique candidates for `query`.
    ///
    /// An empty result means "nothing to process", not an error.
    async fn fetch(&self, query: &str, limit: usize) -> Vec<CandidateImage>;
}
