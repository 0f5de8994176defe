//! Ingestion orchestrator
//!
//! Fetches candidates, then walks them in order: skip what is already
//! stored, extract attributes for the rest under the per-run quota, store
//! each success, and pace the loop between extraction calls.

use chrono::{DateTime, Utc};
use domain_inventory::{CandidateImage, InventoryEntry, InventoryError};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::clients::Clients;
use crate::config::{FailurePolicy, IngestSettings};
use crate::extractor::{truncate, ExtractError};
use crate::pause;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Inventory store failure: {0}")]
    Store(#[from] InventoryError),
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunTermination {
    /// Every candidate was handled
    Completed,
    /// The source returned nothing
    NoCandidates,
    /// The per-run extraction quota was used up
    QuotaExhausted { quota: usize },
    /// An extraction failed under [`FailurePolicy::Halt`]
    ExtractionFailed { image_id: String, reason: String },
}

/// Result of handling one candidate
#[derive(Debug)]
pub enum ItemOutcome {
    Stored,
    Skipped,
    Failed(ExtractError),
}

/// Result of an ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub candidates: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
    pub extraction_calls: usize,
    pub termination: RunTermination,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tally {
    added: usize,
    skipped: usize,
    failed: usize,
    extraction_calls: usize,
}

pub struct InventoryIngestor<'a> {
    clients: &'a Clients,
    settings: &'a IngestSettings,
}

impl<'a> InventoryIngestor<'a> {
    pub fn new(clients: &'a Clients, settings: &'a IngestSettings) -> Self {
        Self { clients, settings }
    }

    /// Run one full ingestion pass.
    ///
    /// Only store failures are returned as errors; quota exhaustion and
    /// extraction failures end the run with a [`RunTermination`].
    #[instrument(skip(self), fields(query = %self.settings.query, limit = self.settings.limit))]
    pub async fn run(&self) -> IngestResult<IngestReport> {
        let start = Instant::now();

        let candidates = self
            .clients
            .source
            .fetch(&self.settings.query, self.settings.limit)
            .await;

        let mut tally = Tally::default();

        let termination = if candidates.is_empty() {
            info!("No images were found to process");
            RunTermination::NoCandidates
        } else {
            info!(
                count = candidates.len(),
                "Found images, starting AI tagging and upload"
            );
            match self.process(&candidates, &mut tally).await {
                Ok(termination) => termination,
                Err(e) => {
                    error!(
                        error = %e,
                        added = tally.added,
                        "Ingestion aborted"
                    );
                    return Err(e);
                }
            }
        };

        let report = IngestReport {
            candidates: candidates.len(),
            added: tally.added,
            skipped: tally.skipped,
            failed: tally.failed,
            extraction_calls: tally.extraction_calls,
            termination,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };

        info!(
            added = report.added,
            skipped = report.skipped,
            failed = report.failed,
            extraction_calls = report.extraction_calls,
            "Process complete! Added {} new items to the inventory",
            report.added
        );

        Ok(report)
    }

    async fn process(
        &self,
        candidates: &[CandidateImage],
        tally: &mut Tally,
    ) -> IngestResult<RunTermination> {
        for candidate in candidates {
            if let Some(quota) = self.settings.quota {
                if tally.extraction_calls >= quota {
                    info!(
                        quota = quota,
                        "Reached the AI call limit for this run, run again later to continue"
                    );
                    return Ok(RunTermination::QuotaExhausted { quota });
                }
            }

            match self.process_one(candidate, tally).await? {
                ItemOutcome::Skipped => continue,
                ItemOutcome::Stored => {}
                ItemOutcome::Failed(e) => match self.settings.failure_policy {
                    FailurePolicy::Halt => {
                        warn!(
                            image_id = %candidate.id,
                            error = %e,
                            "Halting run due to AI analysis error"
                        );
                        return Ok(RunTermination::ExtractionFailed {
                            image_id: candidate.id.clone(),
                            reason: e.to_string(),
                        });
                    }
                    FailurePolicy::Continue => {
                        warn!(
                            image_id = %candidate.id,
                            error = %e,
                            "AI analysis failed, moving on to the next image"
                        );
                        pause(self.settings.failure_pause).await;
                    }
                },
            }

            pause(self.settings.item_delay).await;
        }

        Ok(RunTermination::Completed)
    }

    /// Skip, or extract and store, a single candidate.
    ///
    /// Every extraction attempt counts towards the quota, successful or not.
    async fn process_one(
        &self,
        candidate: &CandidateImage,
        tally: &mut Tally,
    ) -> IngestResult<ItemOutcome> {
        if self.clients.inventory.exists(&candidate.id).await? {
            info!(image_id = %candidate.id, "Skipping image already in the inventory");
            tally.skipped += 1;
            return Ok(ItemOutcome::Skipped);
        }

        info!(
            image_id = %candidate.id,
            url = %truncate(&candidate.url, 60),
            "Analyzing image"
        );

        let extracted = self.clients.extractor.extract(&candidate.url).await;
        tally.extraction_calls += 1;

        let attributes = match extracted {
            Ok(attributes) => attributes,
            Err(e) => {
                error!(image_id = %candidate.id, error = %e, "AI analysis failed");
                tally.failed += 1;
                return Ok(ItemOutcome::Failed(e));
            }
        };

        info!(
            image_id = %candidate.id,
            style = %attributes.style,
            color = %attributes.color,
            "AI analysis complete"
        );

        let entry = InventoryEntry::new(candidate, attributes, self.clients.source.kind());
        self.clients.inventory.put(entry).await?;
        info!(image_id = %candidate.id, "Uploaded to the inventory");

        tally.added += 1;
        Ok(ItemOutcome::Stored)
    }
}
