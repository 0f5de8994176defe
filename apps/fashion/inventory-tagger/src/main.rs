//! Inventory Tagger
//!
//! Fetches fashion photos from Pexels, tags them with AI and stores the
//! results in MongoDB. Each run is one-shot and safe to repeat: stored images
//! are skipped and the AI call quota bounds the spend per run.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_inventory::{InventoryEntry, InventoryRepository, DEFAULT_RECOMMENDATIONS};
use eyre::{Result, WrapErr};
use serde_json::json;
use tracing::{info, warn};

use inventory_tagger::config::store_config_from_env;
use inventory_tagger::{Clients, Config, InventoryIngestor};

#[derive(Parser)]
#[command(name = "inventory-tagger")]
#[command(about = "Tag stock fashion photos with AI and store them in the inventory")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion pass (default)
    Run {
        /// Search query. Overrides PEXELS_QUERY.
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of candidate images to fetch. Overrides IMAGE_LIMIT.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Maximum AI calls for this run. Overrides AI_CALL_QUOTA.
        #[arg(long, conflicts_with = "no_quota")]
        quota: Option<usize>,

        /// Disable the AI call quota
        #[arg(long)]
        no_quota: bool,
    },

    /// Show the stored entry count and store settings
    Status,

    /// Rank stored entries against liked and disliked ones
    Recommend {
        /// Identifiers of liked entries
        #[arg(long, value_delimiter = ',')]
        like: Vec<String>,

        /// Identifiers of disliked entries
        #[arg(long, value_delimiter = ',')]
        dislike: Vec<String>,

        /// Number of recommendations
        #[arg(short, long, default_value_t = DEFAULT_RECOMMENDATIONS)]
        limit: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run {
        query: None,
        limit: None,
        quota: None,
        no_quota: false,
    }) {
        Commands::Run {
            query,
            limit,
            quota,
            no_quota,
        } => {
            let mut config = Config::from_env().wrap_err("Invalid configuration")?;
            if let Some(query) = query {
                config.ingest.query = query;
            }
            if let Some(limit) = limit {
                config.ingest.limit = limit;
            }
            if no_quota {
                config.ingest.quota = None;
            } else if quota.is_some() {
                config.ingest.quota = quota;
            }

            info!(config = %config.summary(), "Starting inventory ingestion");

            let clients = Clients::connect(&config).await?;
            let report = InventoryIngestor::new(&clients, &config.ingest)
                .run()
                .await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Status => {
            let store = store_config_from_env().wrap_err("Invalid configuration")?;
            let inventory = Clients::connect_store(&store).await?;
            let stored = inventory.count().await?;

            let status = json!({
                "stored_entries": stored,
                "database": store.database,
                "collection": store.collection,
                "url": store.redacted_url(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Recommend {
            like,
            dislike,
            limit,
        } => {
            let store = store_config_from_env().wrap_err("Invalid configuration")?;
            let inventory = Clients::connect_store(&store).await?.list().await?;

            let liked = select(&inventory, &like);
            let disliked = select(&inventory, &dislike);
            info!(
                stored = inventory.len(),
                liked = liked.len(),
                disliked = disliked.len(),
                "Ranking inventory"
            );

            let recommendations =
                domain_inventory::recommend(&liked, &disliked, &inventory, limit);
            println!("{}", serde_json::to_string_pretty(&recommendations)?);
        }
    }

    Ok(())
}

/// Stored entries with the given identifiers; unknown ones are logged and ignored.
fn select(inventory: &[InventoryEntry], ids: &[String]) -> Vec<InventoryEntry> {
    ids.iter()
        .filter_map(|id| {
            let found = inventory.iter().find(|entry| &entry.id == id).cloned();
            if found.is_none() {
                warn!(image_id = %id, "Not in the inventory, ignoring");
            }
            found
        })
        .collect()
}
