//! Embedding provider abstraction.
//!
//! An [`EmbeddingProvider`] talks to one backend. The [`Embedder`] wraps the
//! configured provider and enforces the contract the rest of the pipeline
//! relies on: one vector per input, in order, each exactly `dimensions()` long,
//! and no partial results when the backend fails.

use crate::config::EmbeddingConfig;
use crate::embeddings::gemini::GeminiEmbeddingProvider;
use crate::embeddings::hash::HashEmbeddingProvider;
use crate::embeddings::openai::OpenAIEmbeddingProvider;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Fixed dimension of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// Model identity; stored vectors are only comparable within one model.
    fn model(&self) -> &str;

    fn provider_name(&self) -> &str;
}

/// A failed call to a remote embedding backend.
#[derive(Debug)]
pub(crate) struct BackendFailure {
    pub message: String,
    pub retryable: bool,
}

impl BackendFailure {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Classify a transport error: timeouts and connection failures are worth retrying.
    pub fn from_reqwest(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::retryable(format!("{} request timed out: {}", provider, err))
        } else if err.is_connect() || err.is_request() {
            Self::retryable(format!("{} request failed: {}", provider, err))
        } else {
            Self::permanent(format!("{} request failed: {}", provider, err))
        }
    }

    /// Classify a non-success HTTP status: rate limits and server errors are transient.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} API error {}: {}", provider, status, body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::retryable(message)
        } else {
            Self::permanent(message)
        }
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<BackendFailure> for AppError {
    fn from(failure: BackendFailure) -> Self {
        AppError::EmbeddingUnavailable(failure.message)
    }
}

/// Base delay between retries of a remote embedding call.
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

pub(crate) fn build_http_client(timeout: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// The process-wide embedding handle.
pub struct Embedder {
    provider: Box<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl Embedder {
    pub fn new(provider: Box<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    /// Build the embedder selected by configuration.
    pub fn from_config(config: &EmbeddingConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let provider: Box<dyn EmbeddingProvider> = match config.provider.as_str() {
            "openai" => Box::new(OpenAIEmbeddingProvider::new(
                require_key(config)?,
                config.base_url.clone(),
                config.model.clone(),
                config.dimensions,
                timeout,
                config.max_retries,
            )?),
            "gemini" => Box::new(GeminiEmbeddingProvider::new(
                require_key(config)?,
                config.base_url.clone(),
                config.model.clone(),
                config.dimensions,
                timeout,
                config.max_retries,
            )?),
            #[cfg(feature = "fastembed")]
            "fastembed" => Box::new(crate::embeddings::fastembed::FastEmbedProvider::new(
                &config.model,
                config.dimensions,
            )?),
            "hash" => Box::new(HashEmbeddingProvider::with_model(
                config.model.clone(),
                config.dimensions,
            )),
            other => {
                return Err(AppError::Internal(format!(
                    "Unsupported embedding provider: {}",
                    other
                )))
            }
        };

        Ok(Self::new(provider, config.batch_size))
    }

    /// Embed every text. Either all vectors are returned or the call fails.
    pub async fn embed(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self.provider.embed_batch(batch).await?;
            if embedded.len() != batch.len() {
                return Err(AppError::EmbeddingUnavailable(format!(
                    "{} returned {} embeddings for {} inputs",
                    self.provider.provider_name(),
                    embedded.len(),
                    batch.len()
                )));
            }
            // a backend returning the wrong width is misbehaving, not a comparison error
            if let Some(vector) = embedded.iter().find(|v| v.len() != self.dimensions()) {
                return Err(AppError::EmbeddingUnavailable(format!(
                    "{} returned a {}-dimensional vector, expected {}",
                    self.provider.provider_name(),
                    vector.len(),
                    self.dimensions()
                )));
            }
            debug!(
                provider = self.provider.provider_name(),
                batch = batch.len(),
                "Embedded batch"
            );
            vectors.extend(embedded);
        }

        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingUnavailable("No embedding returned".to_string()))
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }
}

fn require_key(config: &EmbeddingConfig) -> AppResult<String> {
    config.api_key.clone().ok_or_else(|| {
        AppError::Internal(format!(
            "EMBEDDING_API_KEY must be set for embedding provider '{}'",
            config.provider
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns a fixed number of vectors regardless of input size.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed_batch(&self, _texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn model(&self) -> &str {
            "short"
        }
        fn provider_name(&self) -> &str {
            "test"
        }
    }

    struct WrongDimensionProvider;

    #[async_trait]
    impl EmbeddingProvider for WrongDimensionProvider {
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn model(&self) -> &str {
            "wrong"
        }
        fn provider_name(&self) -> &str {
            "test"
        }
    }

    /// Fails on the second batch it sees.
    struct FlakyProvider {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(AppError::EmbeddingUnavailable("backend down".to_string()));
            }
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn model(&self) -> &str {
            "flaky"
        }
        fn provider_name(&self) -> &str {
            "test"
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("text number {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batch_equals_individual_calls() {
        let embedder = Embedder::new(Box::new(HashEmbeddingProvider::new(64)), 3);
        let inputs = texts(7);

        let batched = embedder.embed(&inputs).await.unwrap();
        assert_eq!(batched.len(), 7);

        for (text, vector) in inputs.iter().zip(batched.iter()) {
            assert_eq!(&embedder.embed_one(text).await.unwrap(), vector);
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedder = Embedder::new(Box::new(HashEmbeddingProvider::new(16)), 8);
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_mismatch_is_unavailable() {
        let embedder = Embedder::new(Box::new(ShortProvider), 10);
        let err = embedder.embed(&texts(3)).await.unwrap_err();
        assert_eq!(err.kind(), "embedding_unavailable");
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_rejected() {
        let embedder = Embedder::new(Box::new(WrongDimensionProvider), 10);
        let err = embedder.embed(&texts(2)).await.unwrap_err();
        assert_eq!(err.kind(), "embedding_unavailable");
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("3-dimensional"));
    }

    #[tokio::test]
    async fn test_no_partial_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = Embedder::new(
            Box::new(FlakyProvider {
                calls: calls.clone(),
            }),
            2,
        );

        let result = embedder.embed(&texts(5)).await;
        assert!(matches!(result, Err(AppError::EmbeddingUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_hash() {
        let config = EmbeddingConfig {
            provider: "hash".to_string(),
            model: "feature-hash-v1".to_string(),
            api_key: None,
            base_url: None,
            dimensions: 128,
            timeout_secs: 5,
            max_retries: 0,
            batch_size: 16,
        };
        let embedder = Embedder::from_config(&config).unwrap();
        assert_eq!(embedder.dimensions(), 128);
        assert_eq!(embedder.model(), "feature-hash-v1");
        assert_eq!(embedder.provider_name(), "hash");
    }

    #[test]
    fn test_from_config_remote_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
            dimensions: 1536,
            timeout_secs: 5,
            max_retries: 0,
            batch_size: 16,
        };
        assert!(Embedder::from_config(&config).is_err());
    }
}
