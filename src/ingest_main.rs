//! Offline ingestion pass.
//!
//! Step 1 scans the source directory and records the discovered documents in
//! the config file; step 2 extracts, chunks, embeds, and persists the vector
//! index, fully replacing any prior one.

use std::sync::Arc;

use paradigm_ci::config::{AppPaths, CiConfig, ConfigSource};
use paradigm_ci::ingest::chunker::ChunkerConfig;
use paradigm_ci::ingest::{self, IngestionService};
use paradigm_ci::llm::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use paradigm_ci::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let mut config = CiConfig::load(&paths.config_path)
        .map_err(|e| anyhow::anyhow!("cannot load {}: {}", paths.config_path.display(), e))?;
    if let ConfigSource::DefaultFallback { reason } = &config.source {
        tracing::warn!(%reason, "ingesting under the default identity");
    }

    let source_dir = {
        let dir = &config.memory.source_directory;
        if dir.is_absolute() {
            dir.clone()
        } else {
            paths.project_root.join(dir)
        }
    };
    std::fs::create_dir_all(&source_dir)?;

    // Step 1: record the document list in the DNA file.
    let discovered = ingest::discover(&source_dir)
        .map_err(|e| anyhow::anyhow!("cannot scan {}: {}", source_dir.display(), e))?;
    let names: Vec<String> = discovered
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    tracing::info!(
        directory = %source_dir.display(),
        documents = names.len(),
        "sequenced document list"
    );

    config.memory.active_documents = names.clone();
    config
        .write(&paths.config_path)
        .map_err(|e| anyhow::anyhow!("cannot update {}: {}", paths.config_path.display(), e))?;

    // Step 2: build and persist the index.
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::from_env());
    let service = IngestionService::new(ChunkerConfig::default(), embedder);

    let report = service
        .run(&source_dir, &names, &paths.index_dir)
        .await
        .map_err(|e| anyhow::anyhow!("ingestion failed: {}", e))?;

    tracing::info!(
        documents = report.documents_processed,
        skipped = report.documents_skipped,
        chunks = report.chunks_indexed,
        dimension = report.dimension,
        index = %paths.index_dir.display(),
        "memory index saved"
    );

    Ok(())
}
