//! Pexels image source
//!
//! Pages through the Pexels search API.
//! https://www.pexels.com/api/documentation/#photos-search

use async_trait::async_trait;
use domain_inventory::{CandidateImage, ImageSourceKind};
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use super::{ImageSource, SourceError, SourceResult};
use crate::config::PexelsConfig;
use crate::pause;

pub struct PexelsImageSource {
    client: Client,
    config: PexelsConfig,
}

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    /// `null` is treated like an empty list
    #[serde(default)]
    photos: Option<Vec<PexelsPhoto>>,
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    #[serde(default)]
    src: PexelsPhotoSrc,
}

#[derive(Debug, Default, Deserialize)]
struct PexelsPhotoSrc {
    large: Option<String>,
    original: Option<String>,
}

impl PexelsPhoto {
    /// The `large` rendition is plenty for tagging; fall back to `original`.
    fn into_candidate(self) -> Option<CandidateImage> {
        let url = self.src.large.or(self.src.original)?;
        Some(CandidateImage::new(self.id.to_string(), url))
    }
}

impl PexelsImageSource {
    pub fn new(client: Client, config: PexelsConfig) -> Self {
        Self { client, config }
    }

    async fn fetch_page(&self, query: &str, page: u32) -> SourceResult<PexelsSearchResponse> {
        let url = format!(
            "{}/v1/search?query={}&per_page={}&page={}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            self.config.per_page,
            page
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::ApiError { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ImageSource for PexelsImageSource {
    fn kind(&self) -> ImageSourceKind {
        ImageSourceKind::Pexels
    }

    #[instrument(skip(self))]
    async fn fetch(&self, query: &str, limit: usize) -> Vec<CandidateImage> {
        if limit == 0 {
            return Vec::new();
        }

        info!("Getting images from Pexels");
        collect_pages(limit, self.config.page_delay, move |page| {
            self.fetch_page(query, page)
        })
        .await
    }
}

/// Page through search results until `limit` unique candidates are held.
///
/// Stops early on an empty page, on the last page, or on the first failed
/// request, keeping whatever was collected. Pauses `page_delay` only before
/// a page that will actually be requested.
async fn collect_pages<F, Fut>(
    limit: usize,
    page_delay: Duration,
    mut fetch_page: F,
) -> Vec<CandidateImage>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = SourceResult<PexelsSearchResponse>>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut images: Vec<CandidateImage> = Vec::new();

    let mut page = 1;
    while images.len() < limit {
        let data = match fetch_page(page).await {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = %e,
                    page = page,
                    collected = images.len(),
                    "Error fetching from Pexels API, keeping what was collected"
                );
                break;
            }
        };

        let photos = data.photos.unwrap_or_default();
        if photos.is_empty() {
            info!(page = page, "No more photos found");
            break;
        }

        for photo in photos {
            let photo_id = photo.id;
            match photo.into_candidate() {
                Some(candidate) => {
                    if seen.insert(candidate.id.clone()) {
                        images.push(candidate);
                    }
                }
                None => debug!(photo_id = photo_id, "Photo has no usable rendition"),
            }
        }

        info!(unique = images.len(), page = page, "Found unique images so far");

        if data.next_page.is_none() {
            info!("Reached the end of Pexels results");
            break;
        }

        page += 1;
        if images.len() < limit {
            pause(page_delay).await;
        }
    }

    images.truncate(limit);
    images
}
