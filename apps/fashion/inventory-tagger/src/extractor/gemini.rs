//! Single-stage extractor on the Gemini `generateContent` API
//!
//! https://ai.google.dev/api/generate-content

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use domain_inventory::AttributeRecord;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    download_image, parse_attributes, AttributeExtractor, ExtractError, ExtractResult,
    ATTRIBUTE_INSTRUCTION,
};
use crate::config::GeminiConfig;

const SERVICE: &str = "Gemini";

pub struct GeminiExtractor {
    client: Client,
    config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

impl GeminiExtractor {
    pub fn new(client: Client, config: GeminiConfig) -> Self {
        Self { client, config }
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate(&self, request: &GenerateContentRequest<'_>) -> ExtractResult<String> {
        let response = self
            .client
            .post(self.endpoint_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status {
                service: SERVICE,
                status,
                body,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Parse(e.to_string()))?;

        body.text().ok_or(ExtractError::EmptyResponse(SERVICE))
    }
}

#[async_trait]
impl AttributeExtractor for GeminiExtractor {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip(self), fields(model = %self.config.model))]
    async fn extract(&self, image_url: &str) -> ExtractResult<AttributeRecord> {
        let image = download_image(&self.client, image_url).await?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: ATTRIBUTE_INSTRUCTION,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: STANDARD.encode(&image.bytes),
                        },
                    },
                ],
            }],
        };

        let text = self.generate(&request).await?;
        debug!(response = %text, "Gemini answered");

        parse_attributes(&text)
    }
}
