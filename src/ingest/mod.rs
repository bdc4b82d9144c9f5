//! Offline document ingestion.
//!
//! Discovers paginated text documents in a source directory, extracts them
//! page by page, chunks, embeds, and persists the vector index. Runs as a
//! batch pass; re-running fully replaces the persisted index.

pub mod chunker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::index::store;
use crate::index::VectorRecord;
use crate::llm::embedding::EmbeddingProvider;
use chunker::{Chunker, ChunkerConfig, DocumentChunk};

/// One supported document format: plain text with form-feed page breaks.
pub const DOCUMENT_EXTENSION: &str = "txt";
const PAGE_SEPARATOR: char = '\u{0c}';
const EMBED_BATCH_SIZE: usize = 32;

/// One page of extracted document text.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 0-based page number.
    pub page_number: usize,
    pub text: String,
}

/// List ingestible documents in `dir`, sorted by file name for determinism.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, ApiError> {
    let entries = std::fs::read_dir(dir).map_err(ApiError::internal)?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Read a document, preserving page boundaries.
pub fn extract(path: &Path) -> Result<Vec<PageText>, ApiError> {
    let raw = std::fs::read_to_string(path).map_err(ApiError::internal)?;

    Ok(raw
        .split(PAGE_SEPARATOR)
        .enumerate()
        .map(|(page_number, text)| PageText {
            page_number,
            text: text.to_string(),
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents_processed: usize,
    pub documents_skipped: usize,
    pub chunks_indexed: usize,
    pub dimension: usize,
}

/// Orchestrates discover → extract → chunk → embed → persist.
pub struct IngestionService {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IngestionService {
    pub fn new(config: ChunkerConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            chunker: Chunker::new(config),
            embedder,
        }
    }

    /// Ingest the named documents from `source_dir` and write the index to
    /// `index_dir`, replacing any prior index.
    ///
    /// A document that fails extraction is skipped with a warning. If no
    /// chunks result across all documents, the run aborts and nothing is
    /// written.
    pub async fn run(
        &self,
        source_dir: &Path,
        documents: &[String],
        index_dir: &Path,
    ) -> Result<IngestReport, ApiError> {
        let mut chunks: Vec<DocumentChunk> = Vec::new();
        let mut processed = 0;
        let mut skipped = 0;

        for name in documents {
            let path = source_dir.join(name);
            match extract(&path) {
                Ok(pages) => {
                    let doc_chunks = self.chunker.chunk_document(&pages, name);
                    tracing::info!(document = %name, chunks = doc_chunks.len(), "extracted document");
                    chunks.extend(doc_chunks);
                    processed += 1;
                }
                Err(err) => {
                    tracing::warn!(document = %name, error = %err, "skipping unreadable document");
                    skipped += 1;
                }
            }
        }

        if chunks.is_empty() {
            return Err(ApiError::Internal(
                "ingestion produced zero chunks; index not written".to_string(),
            ));
        }

        let records = self.embed_chunks(chunks).await?;
        let dimension = records[0].embedding.len();

        store::save(index_dir, self.embedder.model_id(), &records).await?;

        Ok(IngestReport {
            documents_processed: processed,
            documents_skipped: skipped,
            chunks_indexed: records.len(),
            dimension,
        })
    }

    async fn embed_chunks(
        &self,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Vec<VectorRecord>, ApiError> {
        let mut records = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(ApiError::Upstream(format!(
                    "embedding count mismatch: sent {}, received {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            for (chunk, embedding) in batch.iter().cloned().zip(embeddings) {
                records.push(VectorRecord { embedding, chunk });
            }
        }

        // All records in one index must share a dimension.
        let dimension = records[0].embedding.len();
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(ApiError::Upstream(format!(
                "non-uniform embedding dimension: expected {}, got {} for chunk {}",
                dimension,
                bad.embedding.len(),
                bad.chunk.chunk_index
            )));
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("skip.pdf"), "x").unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();

        let found = discover(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn extract_preserves_page_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "page one\u{0c}page two\u{0c}page three").unwrap();

        let pages = extract(&path).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].page_number, 0);
        assert_eq!(pages[0].text, "page one");
        assert_eq!(pages[2].text, "page three");
    }

    #[test]
    fn extract_without_separator_is_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "just one page").unwrap();

        let pages = extract(&path).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 0);
    }
}
