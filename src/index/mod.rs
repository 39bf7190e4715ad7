//! In-memory vector index with cosine similarity search.
//!
//! Stores one embedding per article chunk, in insertion order. The index is
//! rebuilt from scratch on every build run and persisted as a single file
//! (see [`storage`]).

pub mod storage;

use crate::chunker::Chunk;

/// An entry in the vector index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// The chunk that was embedded
    pub chunk: Chunk,
}

/// Search result from the vector index.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Cosine similarity score
    pub score: f32,
    pub chunk: Chunk,
}

/// In-memory vector index over article chunks.
///
/// Entries keep their insertion order, which makes search results
/// deterministic: equal-score ties resolve to the earlier entry.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    /// Expected embedding dimensions
    dimensions: usize,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Chunk has no source URL")]
    MissingSource,

    #[error("Cannot build an index from zero vectors")]
    Empty,
}

impl VectorIndex {
    /// Create a new empty vector index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            dimensions,
        }
    }

    /// Build an index from parallel vectors and chunks.
    ///
    /// Dimensions are taken from the first vector; every following vector
    /// must match. The caller guarantees `vectors.len() == chunks.len()`.
    pub fn from_parts(vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<Self, IndexError> {
        let dimensions = vectors.first().ok_or(IndexError::Empty)?.len();
        let mut index = Self::with_capacity(dimensions, vectors.len());
        for (embedding, chunk) in vectors.into_iter().zip(chunks) {
            index.insert(embedding, chunk)?;
        }
        Ok(index)
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Append an entry to the index.
    ///
    /// Rejects vectors of the wrong dimension, zero-norm vectors, and chunks
    /// without a source URL.
    pub fn insert(&mut self, embedding: Vec<f32>, chunk: Chunk) -> Result<(), IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        let norm = l2_norm(&embedding);
        if norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        if chunk.source_url.is_empty() {
            return Err(IndexError::MissingSource);
        }

        self.entries.push(IndexEntry { embedding, chunk });
        Ok(())
    }

    /// Return the `limit` most similar chunks, scored by cosine similarity,
    /// highest first. Equal scores keep insertion order.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut results: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                score: cosine_similarity(query, &entry.embedding, query_norm),
                chunk: entry.chunk.clone(),
            })
            .collect();

        // stable sort keeps insertion order for equal scores
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors.
/// Assumes query_norm is precomputed for efficiency.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(url: &str, seq: u32, text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source_url: url.to_string(),
            sequence_index: seq,
        }
    }

    #[test]
    fn test_new_index() {
        let index = VectorIndex::new(3);
        assert_eq!(index.dimensions(), 3);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_insert_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        let result = index.insert(vec![1.0, 0.0], chunk("http://a.com", 0, "t"));
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_insert_zero_norm_rejected() {
        let mut index = VectorIndex::new(3);
        let result = index.insert(vec![0.0, 0.0, 0.0], chunk("http://a.com", 0, "t"));
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[test]
    fn test_insert_missing_source_rejected() {
        let mut index = VectorIndex::new(3);
        let result = index.insert(vec![1.0, 0.0, 0.0], chunk("", 0, "t"));
        assert!(matches!(result, Err(IndexError::MissingSource)));
    }

    #[test]
    fn test_from_parts_empty_rejected() {
        let result = VectorIndex::from_parts(Vec::new(), Vec::new());
        assert!(matches!(result, Err(IndexError::Empty)));
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let mut index = VectorIndex::new(3);
        index
            .insert(vec![1.0, 0.0, 0.0], chunk("http://a.com", 0, "first"))
            .unwrap();
        index
            .insert(vec![0.0, 1.0, 0.0], chunk("http://b.com", 0, "second"))
            .unwrap();

        let results = index.search(&[1.0, 0.1, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.text, "first");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_search_respects_limit() {
        let mut index = VectorIndex::new(2);
        for i in 0..10 {
            index
                .insert(
                    vec![1.0, i as f32 * 0.1],
                    chunk("http://a.com", i, "text"),
                )
                .unwrap();
        }
        let results = index.search(&[1.0, 0.0], 4).unwrap();
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index
            .insert(vec![1.0, 0.0], chunk("http://a.com", 0, "inserted first"))
            .unwrap();
        index
            .insert(vec![2.0, 0.0], chunk("http://b.com", 0, "inserted second"))
            .unwrap();

        // both entries have cosine similarity 1.0 against the query
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk.text, "inserted first");
        assert_eq!(results[1].chunk.text, "inserted second");
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut index = VectorIndex::new(3);
        index
            .insert(vec![0.9, 0.1, 0.0], chunk("http://a.com", 0, "a"))
            .unwrap();
        index
            .insert(vec![0.8, 0.2, 0.0], chunk("http://b.com", 0, "b"))
            .unwrap();
        index
            .insert(vec![0.0, 0.0, 1.0], chunk("http://c.com", 0, "c"))
            .unwrap();

        let query = [1.0, 0.0, 0.0];
        let first = index.search(&query, 2).unwrap();
        for _ in 0..5 {
            let again = index.search(&query, 2).unwrap();
            let texts: Vec<&str> = again.iter().map(|r| r.chunk.text.as_str()).collect();
            let expected: Vec<&str> = first.iter().map(|r| r.chunk.text.as_str()).collect();
            assert_eq!(texts, expected);
        }
    }

    #[test]
    fn test_search_query_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        index
            .insert(vec![1.0, 0.0, 0.0], chunk("http://a.com", 0, "t"))
            .unwrap();
        let result = index.search(&[1.0, 0.0], 4);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }
}
