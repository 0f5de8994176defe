//! Two-stage extractor on Cloudflare Workers AI
//!
//! A vision model captions the image; a chat model turns the caption into
//! the attribute JSON.
//! https://developers.cloudflare.com/workers-ai/

use async_trait::async_trait;
use domain_inventory::AttributeRecord;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use super::{
    download_image, parse_attributes, truncate, AttributeExtractor, ExtractError, ExtractResult,
};
use crate::config::CloudflareConfig;

const SERVICE: &str = "Cloudflare Workers AI";

pub struct CloudflareExtractor {
    client: Client,
    config: CloudflareConfig,
}

#[derive(Debug, Serialize)]
struct VisionRequest<'a> {
    /// Raw bytes as a JSON array of integers
    image: &'a [u8],
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Workers AI response wrapper
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<JsonValue>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct VisionResult {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    response: String,
}

/// Prompt asking the text model to classify a caption.
fn classification_prompt(description: &str) -> String {
    format!(
        "Analyze the following outfit description and return ONLY a valid JSON object with keys: \
         'style' (e.g., 'Casual', 'Formal'), 'color', 'occasion', 'garment_type', and 'fitting'.\n\
         Description: \"{}\"",
        description.trim()
    )
}

impl CloudflareExtractor {
    pub fn new(client: Client, config: CloudflareConfig) -> Self {
        Self { client, config }
    }

    fn model_url(&self, model: &str) -> String {
        format!(
            "{}/client/v4/accounts/{}/ai/run/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.account_id,
            model
        )
    }

    /// Run one model and unwrap its `result`.
    ///
    /// `success: false` is a failure regardless of HTTP status.
    async fn run_model<B, T>(&self, model: &str, body: &B) -> ExtractResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.model_url(model))
            .bearer_auth(&self.config.api_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ExtractError::Status {
                    service: SERVICE,
                    status,
                    body: truncate(&text, 200).to_string(),
                });
            }
            Err(e) => return Err(ExtractError::Parse(e.to_string())),
        };

        if !envelope.success {
            let details = if envelope.errors.is_empty() {
                format!("{model} failed with status {status}")
            } else {
                format!("{model}: {}", JsonValue::Array(envelope.errors))
            };
            return Err(ExtractError::Provider {
                service: SERVICE,
                details,
            });
        }

        envelope.result.ok_or(ExtractError::EmptyResponse(SERVICE))
    }
}

#[async_trait]
impl AttributeExtractor for CloudflareExtractor {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    #[instrument(
        skip(self),
        fields(vision = %self.config.vision_model, text = %self.config.text_model)
    )]
    async fn extract(&self, image_url: &str) -> ExtractResult<AttributeRecord> {
        let image = download_image(&self.client, image_url).await?;

        let vision: VisionResult = self
            .run_model(
                &self.config.vision_model,
                &VisionRequest {
                    image: &image.bytes,
                },
            )
            .await?;
        info!(description = %vision.description.trim(), "AI vision description");

        let chat = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: classification_prompt(&vision.description),
            }],
        };
        let classified: ChatResult = self.run_model(&self.config.text_model, &chat).await?;

        parse_attributes(&classified.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_request_sends_byte_array() {
        let bytes = [255u8, 216, 255];
        let value = serde_json::to_value(VisionRequest { image: &bytes }).unwrap();
        assert_eq!(value, serde_json::json!({ "image": [255, 216, 255] }));
    }

    #[test]
    fn test_model_url_keeps_model_path() {
        let extractor = CloudflareExtractor::new(
            Client::new(),
            CloudflareConfig::new("acct-1", "token").with_base_url("http://localhost:8787"),
        );
        assert_eq!(
            extractor.model_url("@cf/llava-1.5-7b-hf"),
            "http://localhost:8787/client/v4/accounts/acct-1/ai/run/@cf/llava-1.5-7b-hf"
        );
    }

    #[test]
    fn test_prompt_embeds_description() {
        let prompt = classification_prompt("  A woman in a red silk dress.  ");
        assert!(prompt.contains("Description: \"A woman in a red silk dress.\""));
        assert!(prompt.contains("garment_type"));
    }

    #[test]
    fn test_failed_envelope_parses() {
        let body = serde_json::json!({
            "success": false,
            "errors": [{ "code": 5006, "message": "bad input" }],
            "result": null
        });
        let envelope: Envelope<VisionResult> = serde_json::from_value(body).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.errors.len(), 1);
        assert!(envelope.result.is_none());
    }
}
