//! OpenAI-compatible embedding provider (`POST {base}/embeddings`).
//!
//! Also serves Ollama, vLLM and other servers exposing the same endpoint via a custom base URL.

use crate::embeddings::provider::{
    build_http_client, BackendFailure, EmbeddingProvider, RETRY_BASE_DELAY,
};
use crate::types::AppResult;
use crate::utils::retry::with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: Option<String>,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbeddingProvider {
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

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(OPENAI_API_BASE)
            .trim_end_matches('/')
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, BackendFailure> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url()))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| BackendFailure::from_reqwest("OpenAI", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendFailure::from_status("OpenAI", status, &body));
        }

        let mut parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            BackendFailure::permanent(format!("Failed to parse OpenAI embeddings: {}", e))
        })?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
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
        "openai"
    }
}
