use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LLMConfig,
    pub retrieval: RetrievalConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    /// Where uploads are spooled during extraction; the system temp dir when unset.
    pub upload_dir: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

// Connection strings carry credentials
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .finish()
    }
}

impl DatabaseConfig {
    /// `memory://` selects the in-process store instead of Postgres.
    pub fn is_memory(&self) -> bool {
        self.url.as_deref().is_some_and(|u| u.starts_with("memory://"))
    }

    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))
    }
}

#[derive(Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub batch_size: usize,
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("dimensions", &self.dimensions)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

#[derive(Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl std::fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl LLMConfig {
    /// API key for the generation provider, if one was supplied.
    pub fn active_api_key(&self) -> Option<String> {
        self.api_key.clone().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Characters per chunk at ingestion time.
    pub chunk_size: usize,
    /// Maximum number of ranked chunks fed to generation.
    pub top_k: usize,
    /// Maximum combined characters of the assembled context.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            top_k: 3,
            max_context_chars: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub log_dir: Option<String>,
}

pub const DEFAULT_LOG_FILTER: &str = "pdfqa=debug,tower_http=debug";

/// Local sentence model when built with it, otherwise the offline hashing embedder.
pub const DEFAULT_EMBEDDING_PROVIDER: &str = if cfg!(feature = "fastembed") {
    "fastembed"
} else {
    "hash"
};

/// Default embedding model per provider.
fn default_embedding_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "text-embedding-3-small",
        "gemini" => "text-embedding-004",
        "fastembed" => "all-MiniLM-L6-v2",
        _ => "feature-hash-v1",
    }
}

/// Default vector dimension per provider/model.
fn default_embedding_dimensions(provider: &str, model: &str) -> usize {
    match (provider, model) {
        ("openai", "text-embedding-3-large") => 3072,
        ("openai", _) => 1536,
        ("gemini", _) => 768,
        ("fastembed", "bge-base-en-v1.5") => 768,
        _ => 384,
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let embedding_provider = or("EMBEDDING_PROVIDER", DEFAULT_EMBEDDING_PROVIDER).to_lowercase();
        let embedding_model = get("EMBEDDING_MODEL")
            .unwrap_or_else(|| default_embedding_model(&embedding_provider).to_string());
        let embedding_dimensions = match get("EMBEDDING_DIMENSIONS") {
            Some(v) => parse_value("EMBEDDING_DIMENSIONS", &v)?,
            None => default_embedding_dimensions(&embedding_provider, &embedding_model),
        };

        let config = Self {
            server: ServerConfig {
                port: parse_value("PORT", &or("PORT", "3000"))?,
                host: or("HOST", "0.0.0.0"),
                cors_allowed_origins: or("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_upload_bytes: parse_value(
                    "MAX_UPLOAD_BYTES",
                    &or("MAX_UPLOAD_BYTES", "20971520"),
                )?,
                upload_dir: get("UPLOAD_DIR"),
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                max_connections: parse_value(
                    "DB_MAX_CONNECTIONS",
                    &or("DB_MAX_CONNECTIONS", "10"),
                )?,
                min_connections: parse_value(
                    "DB_MIN_CONNECTIONS",
                    &or("DB_MIN_CONNECTIONS", "1"),
                )?,
            },
            embedding: EmbeddingConfig {
                provider: embedding_provider,
                model: embedding_model,
                api_key: get("EMBEDDING_API_KEY"),
                base_url: get("EMBEDDING_BASE_URL"),
                dimensions: embedding_dimensions,
                timeout_secs: parse_value(
                    "EMBEDDING_TIMEOUT_SECS",
                    &or("EMBEDDING_TIMEOUT_SECS", "30"),
                )?,
                max_retries: parse_value(
                    "EMBEDDING_MAX_RETRIES",
                    &or("EMBEDDING_MAX_RETRIES", "3"),
                )?,
                batch_size: parse_value(
                    "EMBEDDING_BATCH_SIZE",
                    &or("EMBEDDING_BATCH_SIZE", "64"),
                )?,
            },
            llm: LLMConfig {
                provider: or("LLM_PROVIDER", "google").to_lowercase(),
                model: or("LLM_MODEL", "gemini-2.0-flash-lite"),
                api_key: get("LLM_API_KEY"),
                base_url: get("LLM_BASE_URL"),
                timeout_secs: parse_value("LLM_TIMEOUT_SECS", &or("LLM_TIMEOUT_SECS", "30"))?,
                max_tokens: parse_value("LLM_MAX_TOKENS", &or("LLM_MAX_TOKENS", "1024"))?,
                temperature: parse_value("LLM_TEMPERATURE", &or("LLM_TEMPERATURE", "0.2"))?,
            },
            retrieval: RetrievalConfig {
                chunk_size: parse_value("CHUNK_SIZE", &or("CHUNK_SIZE", "1000"))?,
                top_k: parse_value("RETRIEVAL_TOP_K", &or("RETRIEVAL_TOP_K", "3"))?,
                max_context_chars: parse_value(
                    "MAX_CONTEXT_CHARS",
                    &or("MAX_CONTEXT_CHARS", "4000"),
                )?,
            },
            logging: LoggingConfig {
                filter: or("RUST_LOG", DEFAULT_LOG_FILTER),
                log_dir: get("LOG_DIR"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retrieval.chunk_size == 0 {
            bail!("CHUNK_SIZE must be greater than zero");
        }
        // stored as a Postgres INT
        if self.retrieval.chunk_size > i32::MAX as usize {
            bail!("CHUNK_SIZE must be at most {}", i32::MAX);
        }
        if self.retrieval.top_k == 0 {
            bail!("RETRIEVAL_TOP_K must be greater than zero");
        }
        if self.retrieval.max_context_chars == 0 {
            bail!("MAX_CONTEXT_CHARS must be greater than zero");
        }
        if self.embedding.dimensions == 0 {
            bail!("EMBEDDING_DIMENSIONS must be greater than zero");
        }
        if self.embedding.batch_size == 0 {
            bail!("EMBEDDING_BATCH_SIZE must be greater than zero");
        }
        match self.embedding.provider.as_str() {
            "hash" => {}
            "fastembed" => {
                if !cfg!(feature = "fastembed") {
                    bail!("EMBEDDING_PROVIDER=fastembed requires building with `--features fastembed`");
                }
            }
            "openai" | "gemini" => {
                if self.embedding.api_key.is_none() {
                    bail!(
                        "EMBEDDING_API_KEY must be set for embedding provider '{}'",
                        self.embedding.provider
                    );
                }
            }
            other => bail!("Unsupported EMBEDDING_PROVIDER: {}", other),
        }
        if crate::types::LLMProvider::parse(&self.llm.provider).is_none() {
            bail!("Unsupported LLM_PROVIDER: {}", self.llm.provider);
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Invalid value for {}: {:?}", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.retrieval.chunk_size, 1000);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.provider, DEFAULT_EMBEDDING_PROVIDER);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.llm.provider, "google");
        assert!(config.llm.active_api_key().is_none());
        assert!(config.database.url.is_none());
        assert_eq!(config.server.cors_allowed_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_remote_embedding_provider_requires_key() {
        let err = load(&[("EMBEDDING_PROVIDER", "openai")]).unwrap_err();
        assert!(err.to_string().contains("EMBEDDING_API_KEY"));

        let config = load(&[
            ("EMBEDDING_PROVIDER", "openai"),
            ("EMBEDDING_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimensions, 1536);
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        assert!(load(&[("CHUNK_SIZE", "0")]).is_err());
    }

    #[test]
    fn test_rejects_chunk_size_beyond_int_column() {
        let too_big = (i32::MAX as u64 + 1).to_string();
        let err = load(&[("CHUNK_SIZE", too_big.as_str())]).unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
        assert!(load(&[("CHUNK_SIZE", "2147483647")]).is_ok());
    }

    #[test]
    fn test_fastembed_defaults() {
        let result = load(&[("EMBEDDING_PROVIDER", "fastembed")]);
        if cfg!(feature = "fastembed") {
            let config = result.unwrap();
            assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
            assert_eq!(config.embedding.dimensions, 384);
        } else {
            assert!(result.unwrap_err().to_string().contains("--features fastembed"));
        }
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        let err = load(&[("PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_memory_database_url() {
        let config = load(&[("DATABASE_URL", "memory://")]).unwrap();
        assert!(config.database.is_memory());
        assert_eq!(config.database.require_url().unwrap(), "memory://");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("LLM_API_KEY", "super-secret"),
            ("DATABASE_URL", "postgres://user:pw@localhost/db"),
        ])
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("user:pw"));
    }
}
