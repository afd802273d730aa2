use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::ChatModel;
use super::types::{ChatDelta, ChatRequest};
use crate::core::errors::ApiError;

/// Provider for OpenAI-compatible chat/embeddings endpoints.
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: String, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    fn request_builder(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.post(url);
        if self.api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.api_key)
        }
    }
}

fn chat_body(request: &ChatRequest, model_id: &str, stream: bool) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": stream,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.top_p {
            obj.insert("top_p".to_string(), json!(t));
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

/// What one SSE `data:` line contributes to the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamFrame {
    Token(String),
    Stop,
    Skip,
}

/// Parses a single SSE line from a streaming chat completion.
///
/// Empty and null deltas are skipped; a frame carrying a finish reason or
/// the `[DONE]` sentinel terminates the stream.
fn parse_stream_line(line: &str) -> StreamFrame {
    let line = line.trim();
    if line.is_empty() {
        return StreamFrame::Skip;
    }
    if line == "data: [DONE]" {
        return StreamFrame::Stop;
    }

    let Some(data) = line.strip_prefix("data: ") else {
        return StreamFrame::Skip;
    };
    let Ok(payload) = serde_json::from_str::<Value>(data) else {
        return StreamFrame::Skip;
    };

    let choice = &payload["choices"][0];
    if let Some(content) = choice["delta"]["content"].as_str() {
        if !content.is_empty() {
            return StreamFrame::Token(content.to_string());
        }
    }
    if choice["finish_reason"].as_str().is_some() {
        return StreamFrame::Stop;
    }

    StreamFrame::Skip
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let body = chat_body(&request, model_id, false);

        let res = self
            .request_builder("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("chat error: {}", text)));
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
    ) -> Result<mpsc::Receiver<Result<ChatDelta, ApiError>>, ApiError> {
        let body = chat_body(&request, model_id, true);

        let res = self
            .request_builder("/v1/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("stream error: {}", text)));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let chunk_str = String::from_utf8_lossy(&bytes);
                        for line in chunk_str.lines() {
                            match parse_stream_line(line) {
                                StreamFrame::Token(token) => {
                                    if tx.send(Ok(ChatDelta::Token(token))).await.is_err() {
                                        return;
                                    }
                                }
                                StreamFrame::Stop => {
                                    // Providers keep sending frames after the
                                    // stop marker; everything past this point
                                    // is dropped.
                                    let _ = tx.send(Ok(ChatDelta::Stop)).await;
                                    return;
                                }
                                StreamFrame::Skip => {}
                            }
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(ApiError::upstream(err))).await;
                        return;
                    }
                }
            }
            let _ = tx.send(Ok(ChatDelta::Stop)).await;
        });

        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .request_builder("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("embed error: {}", text)));
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
                "embedding count mismatch: {} != {}",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
