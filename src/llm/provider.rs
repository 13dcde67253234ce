use async_trait::async_trait;
use crate::config::LLMConfig;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Configuration for one generation provider
pub struct LLMProviderConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

/// Process-wide generation client, pinned to one provider and one model identifier.
pub struct LLM {
    adapter: Option<Box<dyn LLMAdapter>>,
    provider_name: String,
    model: String,
}

impl LLM {
    pub fn new(provider: LLMProviderConfig, model: impl Into<String>) -> AppResult<Self> {
        let kind = LLMProvider::parse(&provider.name).ok_or_else(|| {
            AppError::Internal(format!("Unsupported LLM provider: {}", provider.name))
        })?;

        let base_url = provider.base_url.as_deref();
        let adapter: Box<dyn LLMAdapter> = match kind {
            LLMProvider::OpenAI => Box::new(match base_url {
                Some(url) => crate::llm::openai::OpenAIAdapter::new_with_api_base(&provider.api_key, url),
                None => crate::llm::openai::OpenAIAdapter::new(&provider.api_key),
            }),
            LLMProvider::OpenRouter => Box::new(match base_url {
                Some(url) => crate::llm::openrouter::OpenRouterAdapter::with_api_base(&provider.api_key, url),
                None => crate::llm::openrouter::OpenRouterAdapter::new(&provider.api_key),
            }),
            LLMProvider::Groq => Box::new(match base_url {
                Some(url) => crate::llm::groq::GroqAdapter::with_api_base(&provider.api_key, url),
                None => crate::llm::groq::GroqAdapter::new(&provider.api_key),
            }),
            LLMProvider::Google => Box::new(match base_url {
                Some(url) => crate::llm::google::GoogleAdapter::with_api_base(&provider.api_key, url),
                None => crate::llm::google::GoogleAdapter::new(&provider.api_key),
            }),
        };

        Ok(Self {
            adapter: Some(adapter),
            provider_name: kind.to_string(),
            model: model.into(),
        })
    }

    /// Build from configuration. Without an API key the client is left unconfigured.
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        match config.active_api_key() {
            Some(api_key) => Self::new(
                LLMProviderConfig {
                    name: config.provider.clone(),
                    api_key,
                    base_url: config.base_url.clone(),
                },
                config.model.clone(),
            ),
            None => Ok(Self::unconfigured(config.provider.clone(), config.model.clone())),
        }
    }

    /// Wrap an arbitrary adapter (custom backends, tests).
    pub fn with_adapter(
        adapter: Box<dyn LLMAdapter>,
        provider_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            adapter: Some(adapter),
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    /// A client with no credentials; every call fails with `GenerationFailure`.
    pub fn unconfigured(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            adapter: None,
            provider_name: provider_name.into(),
            model: model.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        match &self.adapter {
            Some(adapter) => adapter.create_chat_completion(request).await,
            None => Err(AppError::GenerationFailure(format!(
                "No API key configured for provider {}",
                self.provider_name
            ))),
        }
    }
}
