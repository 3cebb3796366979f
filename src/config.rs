use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value that failed to parse.
        value: String,
    },
    /// The global configuration cache was already populated.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration shared by the HTTP server, the MCP server, and the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Embedding provider used to vectorize chunks and questions.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality every produced vector must have.
    pub embedding_dimension: usize,
    /// Provider used for question answering, summaries, and translation.
    pub generation_provider: GenerationProvider,
    /// Model used for question answering and summaries.
    pub generation_model: String,
    /// Model used for translation.
    pub translation_model: String,
    /// API key for the OpenAI-compatible endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Vector store backend.
    pub store_backend: StoreBackend,
    /// Directory used by the local store backend.
    pub store_dir: PathBuf,
    /// Base URL of the Qdrant instance when `store_backend` is `qdrant`.
    pub qdrant_url: Option<String>,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Name of the Qdrant collection used for chunk storage.
    pub qdrant_collection_name: String,
    /// Behavior when a document that is already stored gets ingested again.
    pub reingest_policy: ReingestPolicy,
    /// Validation applied to translation target languages.
    pub language_policy: LanguagePolicy,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::OpenAI,
            embedding_model: "text-embedding-3-small".into(),
            embedding_dimension: 1536,
            generation_provider: GenerationProvider::OpenAI,
            generation_model: "gpt-3.5-turbo-instruct".into(),
            translation_model: "gpt-3.5-turbo".into(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            ollama_url: "http://127.0.0.1:11434".into(),
            store_backend: StoreBackend::Local,
            store_dir: PathBuf::from("./vector_db"),
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection_name: "docusmart".into(),
            reingest_policy: ReingestPolicy::Duplicate,
            language_policy: LanguagePolicy::Forward,
            server_port: None,
        }
    }
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
    /// Offline hashed bag-of-words vectors.
    Local,
}

/// Supported text generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationProvider {
    /// Hosted OpenAI-compatible completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON-lines records in a local directory.
    Local,
    /// Remote Qdrant collection.
    Qdrant,
}

/// What ingestion does when the document is already present in the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReingestPolicy {
    /// Append a fresh set of records next to the existing ones.
    #[default]
    Duplicate,
    /// Leave the store untouched and report nothing inserted.
    Skip,
    /// Delete the document's records, then insert the new ones.
    Replace,
}

/// How translation target language codes are validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LanguagePolicy {
    /// Forward any non-empty code to the model.
    #[default]
    Forward,
    /// Reject codes outside the supported list.
    Strict,
}

impl Config {
    /// Load configuration from environment variables, applying defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            embedding_provider: parse_env("EMBEDDING_PROVIDER", defaults.embedding_provider)?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", defaults.embedding_dimension)?,
            generation_provider: parse_env("GENERATION_PROVIDER", defaults.generation_provider)?,
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
            translation_model: load_env_optional("TRANSLATION_MODEL")
                .unwrap_or(defaults.translation_model),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            ollama_url: load_env_optional("OLLAMA_URL").unwrap_or(defaults.ollama_url),
            store_backend: parse_env("STORE_BACKEND", defaults.store_backend)?,
            store_dir: load_env_optional("STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            qdrant_url: load_env_optional("QDRANT_URL"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or(defaults.qdrant_collection_name),
            reingest_policy: parse_env("REINGEST_POLICY", defaults.reingest_policy)?,
            language_policy: parse_env("TRANSLATION_LANGUAGE_POLICY", defaults.language_policy)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| parse_value("SERVER_PORT", &value))
                .transpose()?,
        })
    }

    /// Fail early when the selected providers lack credentials they cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_openai = self.embedding_provider == EmbeddingProvider::OpenAI
            || self.generation_provider == GenerationProvider::OpenAI;
        if needs_openai && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }
        if self.store_backend == StoreBackend::Qdrant && self.qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EMBEDDING_DIMENSION".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

impl FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "qdrant" => Ok(Self::Qdrant),
            _ => Err(()),
        }
    }
}

impl FromStr for ReingestPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "duplicate" => Ok(Self::Duplicate),
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            _ => Err(()),
        }
    }
}

impl FromStr for LanguagePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "strict" => Ok(Self::Strict),
            _ => Err(()),
        }
    }
}

impl EmbeddingProvider {
    /// Lowercase label used in logs and health payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
            Self::Local => "local",
        }
    }
}

impl GenerationProvider {
    /// Lowercase label used in logs and health payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    config.validate()?;
    tracing::debug!(
        embedding_provider = config.embedding_provider.label(),
        embedding_model = %config.embedding_model,
        generation_provider = config.generation_provider.label(),
        generation_model = %config.generation_model,
        store_backend = ?config.store_backend,
        reingest_policy = ?config.reingest_policy,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    Ok(get_config())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.embedding_provider, EmbeddingProvider::OpenAI);
        assert_eq!(config.embedding_dimension, 1536);
        assert_eq!(config.generation_model, "gpt-3.5-turbo-instruct");
        assert_eq!(config.translation_model, "gpt-3.5-turbo");
        assert_eq!(config.store_backend, StoreBackend::Local);
        assert_eq!(config.reingest_policy, ReingestPolicy::Duplicate);
        assert_eq!(config.language_policy, LanguagePolicy::Forward);
    }

    #[test]
    fn enum_values_parse_case_insensitively() {
        assert_eq!("LOCAL".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Local));
        assert_eq!("Qdrant".parse::<StoreBackend>(), Ok(StoreBackend::Qdrant));
        assert_eq!("replace".parse::<ReingestPolicy>(), Ok(ReingestPolicy::Replace));
        assert_eq!("Strict".parse::<LanguagePolicy>(), Ok(LanguagePolicy::Strict));
        assert!("anthropic".parse::<GenerationProvider>().is_err());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let error = parse_value::<usize>("EMBEDDING_DIMENSION", "wide").unwrap_err();
        assert!(error.to_string().contains("EMBEDDING_DIMENSION"));
    }

    #[test]
    fn validation_requires_openai_key_for_openai_providers() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingVariable(key)) if key == "OPENAI_API_KEY"
        ));

        let offline = Config {
            embedding_provider: EmbeddingProvider::Local,
            generation_provider: GenerationProvider::Ollama,
            ..Config::default()
        };
        assert!(offline.validate().is_ok());
    }

    #[test]
    fn validation_requires_qdrant_url_for_qdrant_backend() {
        let config = Config {
            openai_api_key: Some("sk-test".into()),
            store_backend: StoreBackend::Qdrant,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
