//! Groq chat completions client (OpenAI-compatible API).

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

#[derive(Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl GroqProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn build_body(&self, request: &ChatRequest, model_id: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&request, model_id, false);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "chat completion failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::upstream)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_body(&request, model_id, true);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "chat stream failed ({}): {}",
                status, text
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let chunk_str = String::from_utf8_lossy(&bytes);
                        for line in chunk_str.lines() {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            if line == "data: [DONE]" {
                                return;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if let Ok(json) = serde_json::from_str::<Value>(data) {
                                    if let Some(content) =
                                        json["choices"][0]["delta"]["content"].as_str()
                                    {
                                        if !content.is_empty()
                                            && tx.send(Ok(content.to_string())).await.is_err()
                                        {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ApiError::upstream(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}
