//! Attribute extractors
//!
//! An extractor turns one image URL into an [`AttributeRecord`]. Two
//! pipelines exist:
//!
//! - [`GeminiExtractor`]: image bytes and instruction in one multimodal call
//! - [`CloudflareExtractor`]: a vision model captions the image, then a text
//!   model classifies the caption
//!
//! Both end with the same step: strip markdown code fences from the model's
//! answer and parse it as a JSON object.

pub mod cloudflare;
pub mod gemini;

use async_trait::async_trait;
use domain_inventory::AttributeRecord;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use cloudflare::CloudflareExtractor;
pub use gemini::GeminiExtractor;

/// Instruction sent alongside the image (single-stage) or wrapped around the
/// caption (two-stage).
pub const ATTRIBUTE_INSTRUCTION: &str = "Analyze this image of an outfit. Return a JSON object \
with keys: 'style' (e.g., 'Casual', 'Formal', 'Bohemian'), 'color' (dominant color or pattern), \
'occasion' (e.g., 'Everyday', 'Party'), 'garment_type' (e.g., 'Dress', 'Suit'), and 'fitting' \
(e.g., 'Slim Fit', 'Loose').";

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{service} reported failure: {details}")]
    Provider {
        service: &'static str,
        details: String,
    },

    #[error("{0} returned no content")]
    EmptyResponse(&'static str),

    #[error("Response is not a valid attribute object: {0}")]
    Parse(String),
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Trait for image → attributes pipelines
///
/// Implementations make one or more AI calls per invocation; the caller
/// counts each invocation as a single call against its quota.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttributeExtractor: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn extract(&self, image_url: &str) -> ExtractResult<AttributeRecord>;
}

/// Raw image ready to be sent to a model
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Download an image, taking its mime type from `Content-Type`.
pub async fn download_image(client: &Client, image_url: &str) -> ExtractResult<ImagePayload> {
    let response = client.get(image_url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExtractError::Status {
            service: "image host",
            status,
            body,
        });
    }

    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|v| v.starts_with("image/"))
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string());

    let bytes = response.bytes().await?.to_vec();
    Ok(ImagePayload { bytes, mime_type })
}

/// Remove markdown code-fence markers (```` ```json ```` and ```` ``` ````).
pub fn strip_code_fences(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parse a model answer into an [`AttributeRecord`].
///
/// The answer must be a JSON object once code fences are removed. Missing
/// keys become unspecified attributes, but an object that yields none of the
/// five is rejected so it never reaches the inventory.
pub fn parse_attributes(text: &str) -> ExtractResult<AttributeRecord> {
    let cleaned = strip_code_fences(text);
    let value: JsonValue =
        serde_json::from_str(&cleaned).map_err(|e| ExtractError::Parse(e.to_string()))?;

    if !value.is_object() {
        return Err(ExtractError::Parse(format!(
            "expected a JSON object, got: {}",
            truncate(&cleaned, 80)
        )));
    }

    let record: AttributeRecord =
        serde_json::from_value(value).map_err(|e| ExtractError::Parse(e.to_string()))?;

    if record.specified_count() == 0 {
        return Err(ExtractError::Parse(format!(
            "no attributes in answer: {}",
            truncate(&cleaned, 80)
        )));
    }

    Ok(record)
}

/// First `max_chars` characters of `text`, for log lines.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
