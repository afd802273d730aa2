//! Typed runtime configuration.
//!
//! Settings are read from an optional JSON file and overridden by
//! environment variables for endpoints and API keys. The struct is built
//! once at startup and handed to the pipeline by value; nothing reads
//! configuration through globals.

use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the OpenAI-compatible chat/embeddings endpoint.
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    /// API key for the chat/embeddings endpoint.
    #[serde(default)]
    pub llm_api_key: String,
    /// Model used for answer generation and follow-ups.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Base URL of the search API.
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    /// API key for the search API.
    #[serde(default)]
    pub search_api_key: String,
    /// Number of search results requested and attempted for page fetch.
    #[serde(default = "default_pages_to_scan")]
    pub pages_to_scan: usize,
    /// Hard timeout for a single page fetch, in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Target chunk size in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Maximum passages retrieved from the similarity index.
    #[serde(default = "default_top_passages")]
    pub top_passages: usize,
    /// Cap on image/video results after content-type verification.
    #[serde(default = "default_media_results")]
    pub media_results: usize,
    /// Directory for rolling log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_search_base_url() -> String {
    "https://google.serper.dev".to_string()
}

fn default_pages_to_scan() -> usize {
    10
}

fn default_fetch_timeout_ms() -> u64 {
    800
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_top_passages() -> usize {
    4
}

fn default_media_results() -> usize {
    9
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_base_url: default_llm_base_url(),
            llm_api_key: String::new(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            search_base_url: default_search_base_url(),
            search_api_key: String::new(),
            pages_to_scan: default_pages_to_scan(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_passages: default_top_passages(),
            media_results: default_media_results(),
            log_dir: default_log_dir(),
        }
    }
}

impl Settings {
    /// Loads settings from `path` if it exists, then applies environment
    /// overrides. A missing file yields pure defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ApiError> {
        let mut settings = match path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path).map_err(ApiError::internal)?;
                serde_json::from_str(&raw).map_err(|err| {
                    ApiError::BadRequest(format!("invalid config file: {}", err))
                })?
            }
            _ => Settings::default(),
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("BEACON_LLM_BASE_URL") {
            self.llm_base_url = value;
        }
        if let Ok(value) = env::var("OPENAI_API_KEY") {
            self.llm_api_key = value;
        }
        if let Ok(value) = env::var("BEACON_SEARCH_BASE_URL") {
            self.search_base_url = value;
        }
        if let Ok(value) = env::var("SERPER_API_KEY") {
            self.search_api_key = value;
        }
        if let Ok(value) = env::var("BEACON_CHAT_MODEL") {
            self.chat_model = value;
        }
        if let Ok(value) = env::var("BEACON_EMBEDDING_MODEL") {
            self.embedding_model = value;
        }
    }

    fn validate(&self) -> Result<(), ApiError> {
        if self.chunk_size == 0 {
            return Err(ApiError::BadRequest("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_passages == 0 {
            return Err(ApiError::BadRequest(
                "top_passages must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
