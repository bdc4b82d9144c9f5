//! In-memory vector index and similarity retrieval.
//!
//! The index is built once by ingestion, persisted, and loaded read-only at
//! boot. Search is brute-force cosine similarity over all records; the index
//! is shared behind `Arc` with no locking on the read path.

pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::ingest::chunker::DocumentChunk;
use crate::llm::embedding::EmbeddingProvider;

/// One embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub chunk: DocumentChunk,
}

/// A retrieved chunk with its similarity score (higher = more relevant).
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Ranked retrieval output, most relevant first. May be empty.
pub type RetrievalResult = Vec<ScoredChunk>;

/// Immutable post-build collection of vector records.
pub struct VectorIndex {
    embedding_model: String,
    dimension: usize,
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    /// Build an index from records, enforcing uniform dimensionality.
    pub fn from_records(
        embedding_model: String,
        records: Vec<VectorRecord>,
    ) -> Result<Self, ApiError> {
        let dimension = records.first().map(|r| r.embedding.len()).unwrap_or(0);
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(ApiError::Internal(format!(
                "index dimension mismatch: expected {}, got {} for chunk {}",
                dimension,
                bad.embedding.len(),
                bad.chunk.chunk_index
            )));
        }

        Ok(Self {
            embedding_model,
            dimension,
            records,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Return the `k` records closest to `query`, descending similarity.
    pub fn search_embedding(&self, query: &[f32], k: usize) -> RetrievalResult {
        if k == 0 || self.records.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredChunk> = self
            .records
            .iter()
            .map(|record| ScoredChunk {
                chunk: record.chunk.clone(),
                score: cosine_similarity(query, &record.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Query-side retrieval: embeds the query and searches the loaded index.
///
/// Retrieval is optional context, never a hard dependency: an absent index,
/// `k == 0`, or a failed query embedding all yield an empty result.
#[derive(Clone)]
pub struct Retriever {
    index: Option<Arc<VectorIndex>>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Option<Arc<VectorIndex>>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    pub fn has_index(&self) -> bool {
        self.index.as_ref().is_some_and(|ix| !ix.is_empty())
    }

    pub async fn search(&self, query_text: &str, k: usize) -> RetrievalResult {
        if k == 0 {
            return Vec::new();
        }
        let Some(index) = &self.index else {
            return Vec::new();
        };
        if index.is_empty() {
            return Vec::new();
        }

        match self.embedder.embed_one(query_text).await {
            Ok(query_embedding) => index.search_embedding(&query_embedding, k),
            Err(err) => {
                tracing::warn!(error = %err, "query embedding failed; answering without context");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(embedding: Vec<f32>, text: &str, chunk_index: usize) -> VectorRecord {
        VectorRecord {
            embedding,
            chunk: DocumentChunk {
                text: text.to_string(),
                source_path: "doc.txt".to_string(),
                page_number: 0,
                chunk_index,
            },
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::from_records(
            "test-model".to_string(),
            vec![
                record(vec![1.0, 0.0, 0.0], "alpha", 0),
                record(vec![0.0, 1.0, 0.0], "beta", 1),
                record(vec![0.9, 0.1, 0.0], "gamma", 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn search_ranks_by_descending_similarity() {
        let index = sample_index();
        let results = index.search_embedding(&[1.0, 0.0, 0.0], 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.text, "alpha");
        assert_eq!(results[1].chunk.text, "gamma");
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[test]
    fn search_respects_k() {
        let index = sample_index();
        assert_eq!(index.search_embedding(&[1.0, 0.0, 0.0], 2).len(), 2);
        assert_eq!(index.search_embedding(&[1.0, 0.0, 0.0], 10).len(), 3);
        assert!(index.search_embedding(&[1.0, 0.0, 0.0], 0).is_empty());
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = VectorIndex::from_records("test-model".to_string(), Vec::new()).unwrap();
        assert!(index.search_embedding(&[1.0, 0.0], 5).is_empty());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let result = VectorIndex::from_records(
            "test-model".to_string(),
            vec![
                record(vec![1.0, 0.0], "a", 0),
                record(vec![1.0, 0.0, 0.0], "b", 1),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn cosine_basics() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
