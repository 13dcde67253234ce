//! Gemini (Google AI) embedding provider implementation

use crate::embeddings::provider::{
    build_http_client, BackendFailure, EmbeddingProvider, RETRY_BASE_DELAY,
};
use crate::types::AppResult;
use crate::utils::retry::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: Option<String>,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: String,
        dimensions: usize,
        timeout: Duration,
        max_retries: u32,
    ) -> AppResult<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            api_key,
            base_url,
            model,
            dimensions,
            max_retries,
        })
    }

    fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(GEMINI_API_BASE)
            .trim_end_matches('/')
    }

    /// Model name without the `models/` prefix.
    pub fn api_model_name(&self) -> &str {
        self.model.strip_prefix("models/").unwrap_or(&self.model)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendFailure> {
        let model_path = format!("models/{}", self.api_model_name());
        let payload = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model_path.clone(),
                    content: Content {
                        parts: vec![Part { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let url = format!(
            "{}/v1beta/{}:batchEmbedContents",
            self.effective_base_url(),
            model_path
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BackendFailure::from_reqwest("Gemini", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendFailure::from_status("Gemini", status, &body));
        }

        let parsed: BatchEmbedResponse = response.json().await.map_err(|e| {
            BackendFailure::permanent(format!("Failed to parse Gemini embeddings: {}", e))
        })?;

        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = with_retry(
            || self.request(texts),
            self.max_retries,
            RETRY_BASE_DELAY,
            |e: &BackendFailure| e.retryable,
        )
        .await?;

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
