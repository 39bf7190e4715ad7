//! Blocking embeddings client for OpenAI-compatible endpoints.
//!
//! Used on the build path to embed every chunk, and on the query path to
//! embed the question. Requests are batched; the response entries are
//! reordered by their `index` field so output order always matches input
//! order. A count mismatch between inputs and returned vectors is an error,
//! never a silently short result.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::OpenAiConfig;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("failed to build embeddings client: {0}")]
    InitFailed(String),

    #[error("embeddings request failed ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("embeddings request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned {got} embeddings for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("provider returned an empty embedding")]
    EmptyEmbedding,
}

pub struct EmbeddingClient {
    client: Client,
    endpoint: String,
    model: String,
    batch_size: usize,
}

impl EmbeddingClient {
    pub fn new(api_key: &str, config: &OpenAiConfig) -> Result<Self, EmbeddingError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| EmbeddingError::InitFailed(format!("invalid API key: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            model: config.embedding_model.clone(),
            batch_size: config.embed_batch_size.max(1),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// SHA256 hash of the model name, stored in the index header so a stale
    /// index built with a different model is detected on load.
    pub fn model_id_hash(&self) -> [u8; 32] {
        model_id_hash(&self.model)
    }

    /// Embed every text, in order. One vector per input.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            log::debug!("embedding batch of {}", batch.len());
            embeddings.extend(self.request(batch)?);
        }
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: embeddings.len(),
            });
        }
        Ok(embeddings)
    }

    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request(&[text])?
            .into_iter()
            .next()
            .ok_or(EmbeddingError::EmptyEmbedding)
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let resp = self.client.post(&self.endpoint).json(&request).send()?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Api { status, body });
        }

        let mut parsed: EmbeddingResponse = resp.json()?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: inputs.len(),
                got: parsed.data.len(),
            });
        }
        if parsed.data.iter().any(|entry| entry.embedding.is_empty()) {
            return Err(EmbeddingError::EmptyEmbedding);
        }

        Ok(parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }
}

/// SHA256 hash of an embedding model name.
pub fn model_id_hash(model_name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(model_name.as_bytes());
    hasher.finalize().into()
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_hash_is_deterministic() {
        let a = model_id_hash("text-embedding-3-small");
        let b = model_id_hash("text-embedding-3-small");
        assert_eq!(a, b);
    }

    #[test]
    fn test_model_id_hash_differs_per_model() {
        let a = model_id_hash("text-embedding-3-small");
        let b = model_id_hash("text-embedding-3-large");
        assert_ne!(a, b);
    }

    #[test]
    fn test_client_builds_with_plain_key() {
        let config = OpenAiConfig::default();
        let client = EmbeddingClient::new("sk-test", &config).unwrap();
        assert_eq!(client.model(), "text-embedding-3-small");
    }

    #[test]
    fn test_response_entries_sort_by_index() {
        let mut parsed = EmbeddingResponse {
            data: vec![
                EmbeddingData {
                    embedding: vec![2.0],
                    index: 1,
                },
                EmbeddingData {
                    embedding: vec![1.0],
                    index: 0,
                },
            ],
        };
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![1.0]);
        assert_eq!(parsed.data[1].embedding, vec![2.0]);
    }
}
