//! Embedding function: opaque text → fixed-length vector mapping.
//!
//! The provider's model id is recorded in the index manifest at build time
//! and checked at load time; ingestion and query must embed under the same
//! model or relevance ranking silently corrupts.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::ApiError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifies the embedding model. Two providers with the same id must
    /// map text into the same vector space.
    fn model_id(&self) -> &str;

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    async fn embed_one(&self, input: &str) -> Result<Vec<f32>, ApiError> {
        let mut results = self.embed(&[input.to_string()]).await?;
        if results.is_empty() {
            return Err(ApiError::Upstream(
                "embedding endpoint returned no vectors".to_string(),
            ));
        }
        Ok(results.remove(0))
    }
}

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:1234";
const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// OpenAI-style `/v1/embeddings` HTTP provider.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: Client::new(),
        }
    }

    /// Endpoint and model from `EMBEDDINGS_BASE_URL` / `EMBEDDINGS_MODEL`,
    /// defaulting to a local inference server.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("EMBEDDINGS_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("EMBEDDINGS_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(base_url, model)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(ApiError::Upstream(format!(
                "embedding endpoint returned {} vectors for {} inputs",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
