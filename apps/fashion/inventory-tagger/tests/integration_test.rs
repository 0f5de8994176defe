//! Integration tests for the inventory tagger
//!
//! HTTP backends run against wiremock; the inventory store is in memory.

use async_trait::async_trait;
use domain_inventory::{CandidateImage, InventoryEntry, InventoryRepository, InventoryResult};
use inventory_tagger::config::{CloudflareConfig, GeminiConfig, PexelsConfig};
use inventory_tagger::extractor::{
    AttributeExtractor, CloudflareExtractor, ExtractError, GeminiExtractor,
};
use inventory_tagger::source::{ImageSource, PexelsImageSource};
use inventory_tagger::{Clients, IngestSettings, InventoryIngestor, RunTermination};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ATTRIBUTES_JSON: &str = concat!(
    r#"{"style": "Bohemian", "color": "Rust Orange", "occasion": "Festival", "#,
    r#""garment_type": "Maxi Dress", "fitting": "Loose"}"#
);

/// Pexels search page body
fn search_page(server: &MockServer, ids: &[u64], next_page: Option<u32>) -> Value {
    let photos: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "photographer": "Test",
                "src": {
                    "original": format!("{}/images/{id}-original.jpeg", server.uri()),
                    "large": format!("{}/images/{id}.jpeg", server.uri()),
                }
            })
        })
        .collect();

    let mut body = json!({ "page": 1, "per_page": ids.len(), "photos": photos });
    if let Some(next) = next_page {
        body["next_page"] = json!(format!("{}/v1/search?page={next}", server.uri()));
    }
    body
}

fn pexels(server: &MockServer) -> PexelsImageSource {
    let config = PexelsConfig::new("pexels-key")
        .with_base_url(server.uri())
        .with_page_delay(Duration::ZERO);
    PexelsImageSource::new(Client::new(), config)
}

async fn mount_image(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/images/{id}.jpeg")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
        )
        .mount(server)
        .await;
}

fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn gemini_answer(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

#[derive(Default, Clone)]
struct MemoryInventory {
    entries: Arc<Mutex<HashMap<String, InventoryEntry>>>,
}

#[async_trait]
impl InventoryRepository for MemoryInventory {
    async fn exists(&self, id: &str) -> InventoryResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(id))
    }

    async fn put(&self, entry: InventoryEntry) -> InventoryResult<()> {
        self.entries.lock().unwrap().insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn count(&self) -> InventoryResult<u64> {
        Ok(self.entries.lock().unwrap().len() as u64)
    }

    async fn list(&self) -> InventoryResult<Vec<InventoryEntry>> {
        Ok(self.entries.lock().unwrap().values().cloned().collect())
    }
}

mod pexels_tests {
    use super::*;

    fn ids(images: &[CandidateImage]) -> Vec<&str> {
        images.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_pages_are_merged_without_duplicates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "1"))
            .and(query_param("query", "summer dress"))
            .and(header("authorization", "pexels-key"))
            .respond_with(ok_json(search_page(&server, &[1, 2], Some(2))))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "2"))
            .respond_with(ok_json(search_page(&server, &[2, 3], None)))
            .expect(1)
            .mount(&server)
            .await;

        let images = pexels(&server).fetch("summer dress", 10).await;

        assert_eq!(ids(&images), vec!["1", "2", "3"]);
        assert!(images[0].url.ends_with("/images/1.jpeg"));
    }

    #[tokio::test]
    async fn test_limit_stops_paging() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "1"))
            .respond_with(ok_json(search_page(&server, &[1, 2, 3], Some(2))))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "2"))
            .respond_with(ok_json(search_page(&server, &[4], None)))
            .expect(0)
            .mount(&server)
            .await;

        let images = pexels(&server).fetch("fashion", 2).await;
        assert_eq!(ids(&images), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_server_error_keeps_collected_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "1"))
            .respond_with(ok_json(search_page(&server, &[5, 6], Some(2))))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream timeout"))
            .mount(&server)
            .await;

        let images = pexels(&server).fetch("fashion", 100).await;
        assert_eq!(ids(&images), vec!["5", "6"]);
    }

    #[tokio::test]
    async fn test_photo_without_src_is_dropped_alone() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "1"))
            .respond_with(ok_json(search_page(&server, &[1], Some(2))))
            .mount(&server)
            .await;

        let mut second = search_page(&server, &[2, 4], None);
        second["photos"]
            .as_array_mut()
            .unwrap()
            .insert(1, json!({ "id": 3, "photographer": "No Source" }));

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("page", "2"))
            .respond_with(ok_json(second))
            .mount(&server)
            .await;

        let images = pexels(&server).fetch("fashion", 10).await;
        assert_eq!(ids(&images), vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_empty_not_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "bad key" })))
            .mount(&server)
            .await;

        assert!(pexels(&server).fetch("fashion", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_ends_fetch() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ok_json(search_page(&server, &[], Some(2))))
            .expect(1)
            .mount(&server)
            .await;

        assert!(pexels(&server).fetch("nothing matches", 10).await.is_empty());
    }
}

mod gemini_tests {
    use super::*;

    fn gemini(server: &MockServer) -> GeminiExtractor {
        GeminiExtractor::new(
            Client::new(),
            GeminiConfig::new("gemini-key").with_base_url(server.uri()),
        )
    }

    #[tokio::test]
    async fn test_fenced_answer_is_parsed() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "gemini-key"))
            .and(body_partial_json(json!({
                "contents": [{
                    "parts": [
                        {},
                        { "inline_data": { "mime_type": "image/jpeg", "data": "/9j/4A==" } }
                    ]
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_answer(&format!("```json\n{ATTRIBUTES_JSON}\n```"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let record = gemini(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .expect("extraction should succeed");

        assert_eq!(record.style.as_str(), "Bohemian");
        assert_eq!(record.garment_type.as_str(), "Maxi Dress");
        assert_eq!(record.specified_count(), 5);
    }

    #[tokio::test]
    async fn test_prose_answer_is_a_parse_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_answer("I cannot help with that.")),
            )
            .mount(&server)
            .await;

        let err = gemini(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[tokio::test]
    async fn test_empty_object_answer_is_a_parse_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer("```json\n{}\n```")))
            .mount(&server)
            .await;

        let err = gemini(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_is_a_status_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let err = gemini(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        match err {
            ExtractError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 429);
                assert!(body.contains("RESOURCE_EXHAUSTED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_image_fails_before_model_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer(ATTRIBUTES_JSON)))
            .expect(0)
            .mount(&server)
            .await;

        let err = gemini(&server)
            .extract(&format!("{}/images/404.jpeg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Status { .. }));
    }
}

mod cloudflare_tests {
    use super::*;

    fn cloudflare(server: &MockServer) -> CloudflareExtractor {
        let mut config = CloudflareConfig::new("acct", "cf-token").with_base_url(server.uri());
        config.vision_model = "vision".to_string();
        config.text_model = "text".to_string();
        CloudflareExtractor::new(Client::new(), config)
    }

    async fn mount_vision(server: &MockServer, description: &str) {
        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/vision"))
            .and(header("authorization", "Bearer cf-token"))
            .and(body_partial_json(json!({ "image": [255, 216, 255, 224] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": { "description": description }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_caption_then_classification() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;
        mount_vision(&server, "A woman in a loose orange maxi dress.").await;

        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": { "response": format!("```\n{ATTRIBUTES_JSON}\n```") }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let record = cloudflare(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .expect("extraction should succeed");

        assert_eq!(record.color.as_str(), "Rust Orange");
        assert_eq!(record.fitting.as_str(), "Loose");
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_a_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/vision"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 5006, "message": "Invalid image" }],
                "result": null
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/text"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = cloudflare(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        match err {
            ExtractError::Provider { details, .. } => assert!(details.contains("Invalid image")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsuccessful_classification_is_a_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;
        mount_vision(&server, "A woman in a denim jacket.").await;

        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/text"))
            .respond_with(ok_json(json!({
                "success": false,
                "errors": [{ "code": 3040, "message": "Capacity temporarily exceeded" }],
                "result": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = cloudflare(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        match err {
            ExtractError::Provider { details, .. } => {
                assert!(details.starts_with("text:"));
                assert!(details.contains("Capacity temporarily exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_classification_is_a_parse_failure() {
        let server = MockServer::start().await;
        mount_image(&server, 1).await;
        mount_vision(&server, "A man in a suit.").await;

        Mock::given(method("POST"))
            .and(path("/client/v4/accounts/acct/ai/run/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "errors": [],
                "result": { "response": "The style is formal and the color is black." }
            })))
            .mount(&server)
            .await;

        let err = cloudflare(&server)
            .extract(&format!("{}/images/1.jpeg", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}

mod ingest_tests {
    use super::*;

    async fn mount_pexels(server: &MockServer, ids: &[u64]) {
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ok_json(search_page(server, ids, None)))
            .mount(server)
            .await;
        for id in ids {
            mount_image(server, *id).await;
        }
    }

    fn clients(server: &MockServer, inventory: &MemoryInventory) -> Clients {
        Clients::new(
            Box::new(pexels(server)),
            Box::new(GeminiExtractor::new(
                Client::new(),
                GeminiConfig::new("gemini-key").with_base_url(server.uri()),
            )),
            Box::new(inventory.clone()),
        )
    }

    #[tokio::test]
    async fn test_run_tags_and_stores_new_images() {
        let server = MockServer::start().await;
        mount_pexels(&server, &[11, 12, 13]).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer(ATTRIBUTES_JSON)))
            .expect(3)
            .mount(&server)
            .await;

        let inventory = MemoryInventory::default();
        let clients = clients(&server, &inventory);
        let settings = IngestSettings::new("fashion", 10).without_pacing();

        let report = InventoryIngestor::new(&clients, &settings)
            .run()
            .await
            .expect("run should succeed");

        assert_eq!(report.added, 3);
        assert_eq!(report.termination, RunTermination::Completed);

        let entries = inventory.entries.lock().unwrap();
        let entry = entries.get("12").expect("entry 12 stored");
        assert!(entry.image_url.ends_with("/images/12.jpeg"));
        assert_eq!(entry.attributes.occasion.as_str(), "Festival");
    }

    #[tokio::test]
    async fn test_rerun_skips_stored_images() {
        let server = MockServer::start().await;
        mount_pexels(&server, &[21, 22]).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer(ATTRIBUTES_JSON)))
            .expect(2)
            .mount(&server)
            .await;

        let inventory = MemoryInventory::default();
        let clients = clients(&server, &inventory);
        let settings = IngestSettings::new("fashion", 10).without_pacing();
        let ingestor = InventoryIngestor::new(&clients, &settings);

        let first = ingestor.run().await.unwrap();
        let second = ingestor.run().await.unwrap();

        assert_eq!(first.added, 2);
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.extraction_calls, 0);
        assert_eq!(inventory.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_quota_bounds_model_calls() {
        let server = MockServer::start().await;
        mount_pexels(&server, &[31, 32, 33, 34]).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer(ATTRIBUTES_JSON)))
            .expect(2)
            .mount(&server)
            .await;

        let inventory = MemoryInventory::default();
        let clients = clients(&server, &inventory);
        let settings = IngestSettings::new("fashion", 10)
            .with_quota(Some(2))
            .without_pacing();

        let report = InventoryIngestor::new(&clients, &settings).run().await.unwrap();

        assert_eq!(report.extraction_calls, 2);
        assert_eq!(report.termination, RunTermination::QuotaExhausted { quota: 2 });
        assert_eq!(inventory.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_model_failure_halts_run() {
        let server = MockServer::start().await;
        mount_pexels(&server, &[41, 42]).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer("no idea")))
            .expect(1)
            .mount(&server)
            .await;

        let inventory = MemoryInventory::default();
        let clients = clients(&server, &inventory);
        let settings = IngestSettings::new("fashion", 10).without_pacing();

        let report = InventoryIngestor::new(&clients, &settings).run().await.unwrap();

        assert_eq!(report.added, 0);
        assert!(matches!(
            report.termination,
            RunTermination::ExtractionFailed { ref image_id, .. } if image_id == "41"
        ));
        assert_eq!(inventory.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_answer_is_never_stored() {
        let server = MockServer::start().await;
        mount_pexels(&server, &[51]).await;

        Mock::given(method("POST"))
            .respond_with(ok_json(gemini_answer("```json\n{}\n```")))
            .expect(2)
            .mount(&server)
            .await;

        let inventory = MemoryInventory::default();
        let clients = clients(&server, &inventory);
        let settings = IngestSettings::new("fashion", 10).without_pacing();
        let ingestor = InventoryIngestor::new(&clients, &settings);

        let first = ingestor.run().await.unwrap();
        assert!(matches!(first.termination, RunTermination::ExtractionFailed { .. }));
        assert_eq!(inventory.count().await.unwrap(), 0);

        // Still untagged, so the next run tries again
        let second = ingestor.run().await.unwrap();
        assert_eq!(second.extraction_calls, 1);
        assert_eq!(second.skipped, 0);
    }
}
