use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the OpenAI API key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";

const DEFAULT_CONFIG_FILE: &str = "newsqa.yaml";
const DEFAULT_INDEX_PATH: &str = "newsqa_index.bin";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_EMBED_BATCH_SIZE: usize = 64;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set; export it or add it to a .env file")]
    MissingApiKey,

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is malformed: {0}")]
    Malformed(#[from] serde_yml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Article fetching policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// URL schemes that may be fetched
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,

    /// Abort the whole build when any URL fails to fetch.
    /// When false (the default), failing URLs are dropped with a warning.
    #[serde(default)]
    pub strict_fetch: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            user_agent: USER_AGENT_DEFAULT.to_string(),
            allowed_schemes: default_allowed_schemes(),
            strict_fetch: false,
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

fn default_allowed_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

/// Text splitting parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Separators tried in order, coarsest first
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            separators: default_separators(),
        }
    }
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_separators() -> Vec<String> {
    vec![
        "\n\n".to_string(),
        "\n".to_string(),
        ".".to_string(),
        ",".to_string(),
    ]
}

/// Settings for the OpenAI-compatible embedding/completion provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum number of texts per embeddings request
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Per-request timeout in seconds for embedding and chat calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_embed_batch_size() -> usize {
    DEFAULT_EMBED_BATCH_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Query-time retrieval parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the language model
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Where the serialized index lives
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            scrape: ScrapeConfig::default(),
            chunking: ChunkingConfig::default(),
            openai: OpenAiConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from(DEFAULT_INDEX_PATH)
}

impl Config {
    /// Load `newsqa.yaml` from the working directory, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_yml::from_str::<Self>(&raw)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Read the provider API key from the environment.
    pub fn api_key() -> Result<String, ConfigError> {
        std::env::var(ENV_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.max_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunking.max_chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }

        if self.scrape.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "scrape.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.scrape.allowed_schemes.is_empty() {
            return Err(ConfigError::Invalid(
                "scrape.allowed_schemes must not be empty".to_string(),
            ));
        }

        let ai = &self.openai;
        if ai.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "openai.api_base must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&ai.temperature) {
            return Err(ConfigError::Invalid(format!(
                "openai.temperature must be between 0.0 and 2.0, got {}",
                ai.temperature
            )));
        }
        if ai.max_tokens == 0 {
            return Err(ConfigError::Invalid(
                "openai.max_tokens must be greater than 0".to_string(),
            ));
        }
        if ai.embed_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "openai.embed_batch_size must be greater than 0".to_string(),
            ));
        }
        if ai.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "openai.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
