use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::errors::ApiError;

/// A web search hit. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub title: String,
    pub link: String,
    pub favicon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResult {
    pub image_url: String,
    pub link: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// ranked web search, at most `count` results
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SourceReference>, ApiError>;

    /// image search; links are unverified media candidates
    async fn search_images(&self, query: &str) -> Result<Vec<ImageResult>, ApiError>;

    /// video search; `image_url` thumbnails are unverified media candidates
    async fn search_videos(&self, query: &str) -> Result<Vec<VideoResult>, ApiError>;
}

/// Search provider backed by the Serper JSON API.
#[derive(Clone)]
pub struct SerperProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl SerperProvider {
    pub fn new(base_url: String, api_key: String, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(url)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !response.status().is_success() {
            return Err(ApiError::Upstream(format!(
                "search request failed: {}",
                response.status()
            )));
        }

        response.json().await.map_err(ApiError::upstream)
    }
}

fn favicon_for(link: &str) -> String {
    format!(
        "https://www.google.com/s2/favicons?domain={}",
        urlencoding::encode(link)
    )
}

#[async_trait]
impl SearchProvider for SerperProvider {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SourceReference>, ApiError> {
        let payload = self
            .post("/search", json!({ "q": query, "num": count }))
            .await?;

        // Web search output feeds every later stage, so a payload without
        // the result list is a stage failure, not an empty result.
        let items = payload
            .get("organic")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ApiError::Upstream("search payload missing organic results".to_string())
            })?;

        let mut results = Vec::new();
        for item in items {
            let title = item
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let link = item
                .get("link")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }
            let favicon = favicon_for(&link);
            results.push(SourceReference {
                title,
                link,
                favicon,
            });
            if results.len() >= count {
                break;
            }
        }

        Ok(results)
    }

    async fn search_images(&self, query: &str) -> Result<Vec<ImageResult>, ApiError> {
        let payload = self.post("/images", json!({ "q": query })).await?;

        let items = match payload.get("images").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => {
                tracing::warn!("image search payload missing images list; treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        for item in items {
            let title = item
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let link = item
                .get("imageUrl")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if !link.is_empty() {
                results.push(ImageResult { title, link });
            }
        }

        Ok(results)
    }

    async fn search_videos(&self, query: &str) -> Result<Vec<VideoResult>, ApiError> {
        let payload = self.post("/videos", json!({ "q": query })).await?;

        let items = match payload.get("videos").and_then(|v| v.as_array()) {
            Some(items) => items,
            None => {
                tracing::warn!("video search payload missing videos list; treating as empty");
                return Ok(Vec::new());
            }
        };

        let mut results = Vec::new();
        for item in items {
            let image_url = item
                .get("imageUrl")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let link = item
                .get("link")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            if !image_url.is_empty() && !link.is_empty() {
                results.push(VideoResult { image_url, link });
            }
        }

        Ok(results)
    }
}
