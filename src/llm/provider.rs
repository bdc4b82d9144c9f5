use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// The response generator, treated as an opaque text-completion service.
///
/// Both modes carry the same assembled prompt; callers pick one.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name (e.g. "groq")
    fn name(&self) -> &str;

    /// chat completion (blocking mode)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// chat completion (streaming mode); fragments arrive in generation order
    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<String, ApiError>>, ApiError>;
}
