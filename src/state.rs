use std::env;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::config::{AppPaths, CiConfig, ConfigSource};
use crate::engine::{CiEngine, EngineOptions};
use crate::history::HistoryStore;
use crate::index::{store, Retriever};
use crate::llm::embedding::{EmbeddingProvider, HttpEmbeddingProvider};
use crate::llm::{GroqProvider, LlmProvider};

pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: CiConfig,
    pub engine: CiEngine,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Construct every service in a fixed order: config, credentials,
    /// history, index, providers, engine. Missing generator credentials are
    /// fatal; a missing index is not.
    pub async fn initialize(paths: Arc<AppPaths>) -> anyhow::Result<Arc<Self>> {
        let config = CiConfig::load(&paths.config_path)
            .map_err(|e| anyhow::anyhow!("cannot load {}: {}", paths.config_path.display(), e))?;
        match &config.source {
            ConfigSource::Loaded(path) => {
                tracing::info!(config = %path.display(), ci_name = %config.identity.ci_name, "DNA loaded");
            }
            ConfigSource::DefaultFallback { reason } => {
                tracing::warn!(%reason, "running with default identity");
            }
        }

        // The generator is a hard dependency; refuse to boot half-initialized.
        let api_key = env::var("GROQ_API_KEY")
            .context("GROQ_API_KEY is not set; the response generator cannot be reached")?;

        let history = HistoryStore::new(paths.history_db_path.clone())
            .await
            .map_err(|e| anyhow::anyhow!("cannot open conversation memory: {}", e))?;

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HttpEmbeddingProvider::from_env());

        let index = match store::load(&paths.index_dir, embedder.model_id()).await {
            Ok(index) => index,
            Err(err) => {
                tracing::warn!(error = %err, "memory index unreadable; proceeding without it");
                None
            }
        };
        match &index {
            Some(ix) => {
                tracing::info!(records = ix.len(), dimension = ix.dimension(), "memory loaded (RAG mode active)");
            }
            None => {
                tracing::warn!("no memory index found; conversational mode only");
            }
        }

        let retriever = Retriever::new(index.map(Arc::new), embedder);
        let llm: Arc<dyn LlmProvider> = Arc::new(GroqProvider::new(api_key));

        let engine = CiEngine::new(
            config.identity.clone(),
            config.mutations.clone(),
            retriever,
            history,
            llm,
            EngineOptions::default(),
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            engine,
            started_at: Utc::now(),
        }))
    }
}
