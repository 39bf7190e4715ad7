//! Retrieval-augmented answering over the article index.
//!
//! Embeds the question, pulls the most similar chunks from the index, hands
//! them to the chat model tagged with their source URLs, and parses the
//! model's reply into an answer plus the list of sources it claims to have
//! used. Sources are newline-delimited after a `SOURCES:` marker; they are
//! trimmed and deduplicated keeping first-seen order.

use crate::config::RetrievalConfig;
use crate::embeddings::{EmbeddingClient, EmbeddingError};
use crate::index::{IndexError, ScoredChunk, VectorIndex};
use crate::llm::{ChatClient, LlmError};

/// Marker line separating the answer from the source list in the model
/// response. The system prompt instructs the model to always emit it.
pub const SOURCES_MARKER: &str = "SOURCES:";

const SYSTEM_PROMPT: &str = "You answer questions using only the provided article extracts. \
Be concise and factual. After your answer, output a line containing exactly 'SOURCES:' \
followed by the URLs of the extracts you actually used, one URL per line. If none of the \
extracts were useful, still output the 'SOURCES:' line, with nothing after it. \
Never invent URLs.";

/// A synthesized answer with its contributing source URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Deduplicated source URLs in first-seen order
    pub sources: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("failed to embed the question: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval failed: {0}")]
    Index(#[from] IndexError),

    #[error("language model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model response has no SOURCES section")]
    MalformedResponse,
}

/// Answer a question from the given index.
///
/// Stateless: one retrieval, one completion, no partial answer on failure.
pub fn answer(
    question: &str,
    index: &VectorIndex,
    embedder: &EmbeddingClient,
    chat: &ChatClient,
    retrieval: &RetrievalConfig,
) -> Result<Answer, QaError> {
    let query = embedder.embed_one(question)?;
    let hits = index.search(&query, retrieval.top_k)?;
    log::debug!("retrieved {} chunks for question", hits.len());

    let prompt = build_prompt(question, &hits);
    let raw = chat.complete(SYSTEM_PROMPT, &prompt)?;

    parse_response(&raw)
}

fn build_prompt(question: &str, hits: &[ScoredChunk]) -> String {
    let mut prompt = format!("Question: {question}\n\nExtracts:\n");
    for hit in hits {
        prompt.push_str(&format!(
            "\n[source: {}]\n{}\n",
            hit.chunk.source_url, hit.chunk.text
        ));
    }
    prompt
}

/// Split a raw model response into answer text and source list.
pub(crate) fn parse_response(raw: &str) -> Result<Answer, QaError> {
    let (text, sources_block) = raw
        .split_once(SOURCES_MARKER)
        .ok_or(QaError::MalformedResponse)?;

    Ok(Answer {
        text: text.trim().to_string(),
        sources: parse_sources(sources_block),
    })
}

/// Parse a newline-delimited sources block.
///
/// Tokens are trimmed (tolerating a leading list bullet), blanks dropped,
/// and duplicates removed keeping the first occurrence.
pub(crate) fn parse_sources(block: &str) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for line in block.lines() {
        let url = line.trim().trim_start_matches(['-', '*']).trim();
        if url.is_empty() {
            continue;
        }
        if !sources.iter().any(|seen| seen == url) {
            sources.push(url.to_string());
        }
    }
    sources
}
