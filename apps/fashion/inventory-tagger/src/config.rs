//! Configuration for the inventory tagger
//!
//! Everything is read from the environment once at startup into [`Config`],
//! which is then passed by reference to the components that need it.

use core_config::{
    env_duration_ms, env_or_default, env_parse_or, env_required, ConfigError, FromEnv,
};
use domain_inventory::MongoStoreConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use strum::{Display, EnumString};

pub const DEFAULT_QUERY: &str = "female fashion model";
pub const DEFAULT_IMAGE_LIMIT: usize = 500;
/// A little under the free-tier daily allowance of ~50 multimodal calls
pub const DEFAULT_AI_CALL_QUOTA: usize = 48;

const DEFAULT_PEXELS_BASE_URL: &str = "https://api.pexels.com";
const DEFAULT_PEXELS_PER_PAGE: u32 = 80;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const DEFAULT_CLOUDFLARE_BASE_URL: &str = "https://api.cloudflare.com";
const DEFAULT_CLOUDFLARE_VISION_MODEL: &str = "@cf/llava-1.5-7b-hf";
const DEFAULT_CLOUDFLARE_TEXT_MODEL: &str = "@cf/meta/llama-2-7b-chat-int8";

#[derive(Debug, Clone)]
pub struct Config {
    pub pexels: PexelsConfig,
    pub extractor: ExtractorConfig,
    pub ingest: IngestSettings,
    pub store: MongoStoreConfig,
    /// Applied to every outbound HTTP request
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PexelsConfig {
    pub api_key: String,
    pub base_url: String,
    pub per_page: u32,
    /// Pause between page requests
    pub page_delay: Duration,
}

impl PexelsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_PEXELS_BASE_URL.to_string(),
            per_page: DEFAULT_PEXELS_PER_PAGE,
            page_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }
}

/// Which AI pipeline turns an image into attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExtractorBackend {
    /// One multimodal call
    Gemini,
    /// Vision caption, then text classification
    Cloudflare,
}

impl ExtractorBackend {
    /// Pause after each extraction call, sized to the provider's rate limit.
    pub fn default_item_delay(&self) -> Duration {
        match self {
            // 10 requests per minute
            ExtractorBackend::Gemini => Duration::from_secs(6),
            ExtractorBackend::Cloudflare => Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExtractorConfig {
    Gemini(GeminiConfig),
    Cloudflare(CloudflareConfig),
}

impl ExtractorConfig {
    pub fn backend(&self) -> ExtractorBackend {
        match self {
            ExtractorConfig::Gemini(_) => ExtractorBackend::Gemini,
            ExtractorConfig::Cloudflare(_) => ExtractorBackend::Cloudflare,
        }
    }

    fn from_env(backend: ExtractorBackend) -> Result<Self, ConfigError> {
        Ok(match backend {
            ExtractorBackend::Gemini => ExtractorConfig::Gemini(GeminiConfig {
                api_key: env_required("GOOGLE_API_KEY")?,
                model: env_or_default("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                base_url: env_or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            }),
            ExtractorBackend::Cloudflare => ExtractorConfig::Cloudflare(CloudflareConfig {
                account_id: env_required("CLOUDFLARE_ACCOUNT_ID")?,
                api_token: env_required("CLOUDFLARE_API_TOKEN")?,
                vision_model: env_or_default(
                    "CLOUDFLARE_VISION_MODEL",
                    DEFAULT_CLOUDFLARE_VISION_MODEL,
                ),
                text_model: env_or_default("CLOUDFLARE_TEXT_MODEL", DEFAULT_CLOUDFLARE_TEXT_MODEL),
                base_url: env_or_default("CLOUDFLARE_BASE_URL", DEFAULT_CLOUDFLARE_BASE_URL),
            }),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub account_id: String,
    pub api_token: String,
    pub vision_model: String,
    pub text_model: String,
    pub base_url: String,
}

impl CloudflareConfig {
    pub fn new(account_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_token: api_token.into(),
            vision_model: DEFAULT_CLOUDFLARE_VISION_MODEL.to_string(),
            text_model: DEFAULT_CLOUDFLARE_TEXT_MODEL.to_string(),
            base_url: DEFAULT_CLOUDFLARE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// What happens to the run when one extraction fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FailurePolicy {
    /// Stop processing further candidates
    #[default]
    Halt,
    /// Wait `failure_pause`, then move on to the next candidate
    Continue,
}

/// Per-run parameters of the ingestion loop
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub query: String,
    /// Maximum number of candidates fetched from the source
    pub limit: usize,
    /// Ceiling on extraction calls per run; `None` means unlimited
    pub quota: Option<usize>,
    /// Pause after every extraction call that does not end the run
    pub item_delay: Duration,
    pub failure_policy: FailurePolicy,
    /// Extra pause after a failure under [`FailurePolicy::Continue`]
    pub failure_pause: Duration,
}

impl IngestSettings {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            quota: Some(DEFAULT_AI_CALL_QUOTA),
            item_delay: ExtractorBackend::Gemini.default_item_delay(),
            failure_policy: FailurePolicy::Halt,
            failure_pause: Duration::from_secs(5),
        }
    }

    /// Settings with every pause set to zero
    pub fn without_pacing(mut self) -> Self {
        self.item_delay = Duration::ZERO;
        self.failure_pause = Duration::ZERO;
        self
    }

    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// Inventory store settings alone, for commands that make no search or AI
/// calls and so need none of their credentials.
pub fn store_config_from_env() -> Result<MongoStoreConfig, ConfigError> {
    Ok(MongoStoreConfig::from_env()?.with_app_name("inventory-tagger"))
}

/// `unlimited`/`none`/`off` disable the quota; anything else must be a count.
fn parse_quota(raw: &str) -> Result<Option<usize>, ConfigError> {
    let raw = raw.trim();
    if ["unlimited", "none", "off"]
        .iter()
        .any(|word| raw.eq_ignore_ascii_case(word))
    {
        return Ok(None);
    }
    usize::from_str(raw)
        .map(Some)
        .map_err(|e| ConfigError::ParseError {
            key: "AI_CALL_QUOTA".to_string(),
            details: e.to_string(),
        })
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        let backend: ExtractorBackend = env_or_default("EXTRACTOR", "gemini")
            .parse()
            .map_err(|e: strum::ParseError| ConfigError::ParseError {
                key: "EXTRACTOR".to_string(),
                details: e.to_string(),
            })?;

        let failure_policy: FailurePolicy = env_or_default("FAILURE_POLICY", "halt")
            .parse()
            .map_err(|e: strum::ParseError| ConfigError::ParseError {
                key: "FAILURE_POLICY".to_string(),
                details: e.to_string(),
            })?;

        let quota = match std::env::var("AI_CALL_QUOTA") {
            Ok(raw) => parse_quota(&raw)?,
            Err(_) => Some(DEFAULT_AI_CALL_QUOTA),
        };

        Ok(Config {
            pexels: PexelsConfig {
                api_key: env_required("PEXELS_API_KEY")?,
                base_url: env_or_default("PEXELS_BASE_URL", DEFAULT_PEXELS_BASE_URL),
                per_page: env_parse_or("PEXELS_PER_PAGE", DEFAULT_PEXELS_PER_PAGE)?,
                page_delay: env_duration_ms("PAGE_DELAY_MS", Duration::from_secs(1))?,
            },
            extractor: ExtractorConfig::from_env(backend)?,
            ingest: IngestSettings {
                query: env_or_default("PEXELS_QUERY", DEFAULT_QUERY),
                limit: env_parse_or("IMAGE_LIMIT", DEFAULT_IMAGE_LIMIT)?,
                quota,
                item_delay: env_duration_ms("ITEM_DELAY_MS", backend.default_item_delay())?,
                failure_policy,
                failure_pause: env_duration_ms("FAILURE_PAUSE_MS", Duration::from_secs(5))?,
            },
            store: store_config_from_env()?,
            http_timeout: Duration::from_secs(env_parse_or("HTTP_TIMEOUT_SECS", 30)?),
        })
    }
}

impl Config {
    /// Effective configuration with secrets left out, for `status` output.
    pub fn summary(&self) -> serde_json::Value {
        let extractor = match &self.extractor {
            ExtractorConfig::Gemini(c) => json!({
                "backend": ExtractorBackend::Gemini,
                "model": c.model,
                "base_url": c.base_url,
            }),
            ExtractorConfig::Cloudflare(c) => json!({
                "backend": ExtractorBackend::Cloudflare,
                "vision_model": c.vision_model,
                "text_model": c.text_model,
                "base_url": c.base_url,
            }),
        };

        json!({
            "pexels": {
                "base_url": self.pexels.base_url,
                "per_page": self.pexels.per_page,
                "page_delay_ms": self.pexels.page_delay.as_millis() as u64,
            },
            "extractor": extractor,
            "ingest": {
                "query": self.ingest.query,
                "limit": self.ingest.limit,
                "quota": self.ingest.quota,
                "item_delay_ms": self.ingest.item_delay.as_millis() as u64,
                "failure_policy": self.ingest.failure_policy,
                "failure_pause_ms": self.ingest.failure_pause.as_millis() as u64,
            },
            "store": {
                "url": self.store.redacted_url(),
                "database": self.store.database,
                "collection": self.store.collection,
            },
            "http_timeout_secs": self.http_timeout.as_secs(),
        })
    }
}
