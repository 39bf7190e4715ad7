//! The two operations behind the presentation shell: build the article
//! index, and answer a question from it.
//!
//! Each operation runs its pipeline stages to completion and fails fast;
//! empty results (no articles, no chunks) are outcomes, not errors, and
//! leave any previously built index untouched.

use crate::chunker;
use crate::config::{Config, ConfigError};
use crate::embeddings::{EmbeddingClient, EmbeddingError};
use crate::index::storage::{IndexStorage, StorageError};
use crate::index::{IndexError, VectorIndex};
use crate::llm::ChatClient;
use crate::qa::{self, Answer, QaError};
use crate::scrape::{self, ScrapeError};

pub struct App {
    config: Config,
    api_key: String,
}

/// Result of a build run that did not fail outright.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The index was built and saved
    Indexed(BuildReport),
    /// No article text could be extracted from any URL
    NoArticles,
    /// Articles were fetched but produced no chunks
    NoChunks,
}

#[derive(Debug)]
pub struct BuildReport {
    pub articles: usize,
    pub chunks: usize,
    pub dimensions: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to load articles: {0}")]
    Scrape(#[from] ScrapeError),

    #[error("failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to assemble index: {0}")]
    Index(#[from] IndexError),

    #[error("failed to save index: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("no index has been built yet")]
    IndexMissing,

    #[error("failed to load index: {0}")]
    Storage(StorageError),

    #[error(transparent)]
    Qa(#[from] QaError),
}

impl App {
    /// Create the app, reading the provider API key from the environment.
    ///
    /// Fails with [`ConfigError::MissingApiKey`] before any pipeline work
    /// when the key is absent.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let api_key = Config::api_key()?;
        Ok(Self { config, api_key })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the given URLs and replace the persisted index.
    ///
    /// The index is assembled fully in memory and only then written to disk,
    /// so a failing run never leaves a partial index behind.
    pub fn build_index(&self, urls: &[String; 3]) -> Result<BuildOutcome, BuildError> {
        log::info!("loading {} urls", urls.len());
        let articles = scrape::load_articles(urls.as_slice(), &self.config.scrape)?;
        if articles.is_empty() {
            return Ok(BuildOutcome::NoArticles);
        }
        log::info!("loaded {} articles", articles.len());

        let chunks = chunker::split_articles(&articles, &self.config.chunking);
        if chunks.is_empty() {
            return Ok(BuildOutcome::NoChunks);
        }
        log::info!("split into {} chunks", chunks.len());

        let embedder = EmbeddingClient::new(&self.api_key, &self.config.openai)?;
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;

        let index = VectorIndex::from_parts(vectors, chunks)?;

        let storage = self.storage();
        storage.save(&index, &embedder.model_id_hash())?;
        log::info!(
            "saved {} vectors to {}",
            index.len(),
            storage.path().display()
        );

        Ok(BuildOutcome::Indexed(BuildReport {
            articles: articles.len(),
            chunks: index.len(),
            dimensions: index.dimensions(),
        }))
    }

    /// Answer a question from the currently persisted index.
    pub fn answer_question(&self, question: &str) -> Result<Answer, AskError> {
        let embedder =
            EmbeddingClient::new(&self.api_key, &self.config.openai).map_err(QaError::from)?;
        let chat = ChatClient::new(&self.api_key, &self.config.openai).map_err(QaError::from)?;

        let index = match self.storage().load(&embedder.model_id_hash()) {
            Ok(index) => index,
            Err(StorageError::NotFound(_)) => return Err(AskError::IndexMissing),
            Err(err) => return Err(AskError::Storage(err)),
        };

        Ok(qa::answer(
            question,
            &index,
            &embedder,
            &chat,
            &self.config.retrieval,
        )?)
    }

    fn storage(&self) -> IndexStorage {
        IndexStorage::new(self.config.index_path.clone())
    }
}
