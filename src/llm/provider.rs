use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatDelta, ChatRequest};
use crate::core::errors::ApiError;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// chat completion (non-streaming)
    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError>;

    /// chat completion (streaming); the receiver yields tokens in arrival
    /// order and terminates with `ChatDelta::Stop`
    async fn stream_chat(
        &self,
        request: ChatRequest,
        model_id: &str,
    ) -> Result<mpsc::Receiver<Result<ChatDelta, ApiError>>, ApiError>;

    /// generate embeddings for a batch of inputs
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError>;
}
