//! Local sentence embeddings with fastembed.
//!
//! Runs an ONNX sentence-transformer in process, so no API key or network is
//! needed once the model files are cached. The model is loaded on the first
//! request and then owned by a single worker thread; requests reach it over a
//! channel, so the model itself needs no lock.

use crate::embeddings::provider::EmbeddingProvider;
use crate::types::{AppError, AppResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::{debug, info};

pub const DEFAULT_FASTEMBED_MODEL: &str = "all-MiniLM-L6-v2";

/// Supported local models and their output width.
pub fn parse_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" | "allminilml6v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" | "bge-small-en" => Some((EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" | "bge-base-en" => Some((EmbeddingModel::BGEBaseENV15, 768)),
        "multilingual-e5-small" => Some((EmbeddingModel::MultilingualE5Small, 384)),
        _ => None,
    }
}

struct EmbedJob {
    texts: Vec<String>,
    reply: oneshot::Sender<AppResult<Vec<Vec<f32>>>>,
}

pub struct FastEmbedProvider {
    model: EmbeddingModel,
    model_name: String,
    dimensions: usize,
    worker: OnceCell<mpsc::Sender<EmbedJob>>,
}

impl FastEmbedProvider {
    /// Select a model. Nothing is downloaded or loaded until the first embed call.
    pub fn new(model_name: &str, dimensions: usize) -> AppResult<Self> {
        let (model, native_dimensions) = parse_model(model_name).ok_or_else(|| {
            AppError::Internal(format!("Unsupported fastembed model: {}", model_name))
        })?;
        if dimensions != native_dimensions {
            return Err(AppError::Internal(format!(
                "{} produces {}-dimensional vectors, EMBEDDING_DIMENSIONS is {}",
                model_name, native_dimensions, dimensions
            )));
        }

        Ok(Self {
            model,
            model_name: model_name.to_string(),
            dimensions,
            worker: OnceCell::new(),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.worker.initialized()
    }

    async fn worker(&self) -> AppResult<&mpsc::Sender<EmbedJob>> {
        self.worker
            .get_or_try_init(|| async {
                info!(model = %self.model_name, "Loading fastembed model");
                let options = InitOptions::new(self.model.clone()).with_show_download_progress(false);
                let model = tokio::task::spawn_blocking(move || TextEmbedding::try_new(options))
                    .await
                    .map_err(|e| AppError::Internal(format!("fastembed loader task failed: {}", e)))?
                    .map_err(|e| {
                        AppError::EmbeddingUnavailable(format!("Failed to load fastembed model: {}", e))
                    })?;

                let (tx, rx) = mpsc::channel(32);
                std::thread::Builder::new()
                    .name("fastembed".to_string())
                    .spawn(move || run_worker(model, rx))
                    .map_err(|e| AppError::Internal(format!("Failed to start fastembed worker: {}", e)))?;

                info!(model = %self.model_name, "fastembed model ready");
                Ok(tx)
            })
            .await
    }
}

/// Owns the model; exits when every sender is dropped.
fn run_worker(mut model: TextEmbedding, mut jobs: mpsc::Receiver<EmbedJob>) {
    while let Some(job) = jobs.blocking_recv() {
        let result = model
            .embed(job.texts, None)
            .map_err(|e| AppError::EmbeddingUnavailable(format!("fastembed inference failed: {}", e)));
        let _ = job.reply.send(result);
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let worker = self.worker().await?;
        let (reply, response) = oneshot::channel();

        worker
            .send(EmbedJob {
                texts: texts.to_vec(),
                reply,
            })
            .await
            .map_err(|_| AppError::EmbeddingUnavailable("fastembed worker stopped".to_string()))?;

        debug!(batch = texts.len(), "Sent batch to fastembed worker");

        response
            .await
            .unwrap_or_else(|_| Err(AppError::EmbeddingUnavailable("fastembed worker stopped".to_string())))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}
