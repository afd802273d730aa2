//! Shared fakes and mock upstreams for the integration suites.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use beacon_backend::core::errors::ApiError;
use beacon_backend::llm::{ChatDelta, ChatModel, ChatRequest};
use beacon_backend::tools::search::{
    ImageResult, SearchProvider, SourceReference, VideoResult,
};

/// Chat/embeddings fake. Streams the configured deltas, captures every
/// request for prompt assertions and answers follow-up calls with the
/// configured JSON (or an error when none is configured).
pub struct FakeChatModel {
    pub deltas: Vec<ChatDelta>,
    pub follow_up_json: Option<String>,
    pub captured_stream_requests: Mutex<Vec<ChatRequest>>,
    pub fail_embeddings: bool,
}

impl FakeChatModel {
    pub fn new(deltas: Vec<ChatDelta>) -> Self {
        Self {
            deltas,
            follow_up_json: Some(
                r#"{"original": "", "followUp": ["one?", "two?", "three?"]}"#.to_string(),
            ),
            captured_stream_requests: Mutex::new(Vec::new()),
            fail_embeddings: false,
        }
    }

    pub fn without_follow_ups(mut self) -> Self {
        self.follow_up_json = None;
        self
    }

    pub fn last_stream_prompt(&self) -> Option<String> {
        self.captured_stream_requests
            .lock()
            .unwrap()
            .last()
            .map(|request| {
                request
                    .messages
                    .iter()
                    .map(|m| m.content.clone())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
    }
}

/// Deterministic 3-dimensional embedding so similarity ranking is stable
/// across the fake.
fn embed_text(text: &str) -> Vec<f32> {
    let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count() as f32;
    let spaces = text.chars().filter(|c| *c == ' ').count() as f32;
    let len = text.chars().count() as f32;
    vec![vowels + 1.0, spaces + 1.0, len + 1.0]
}

#[async_trait]
impl ChatModel for FakeChatModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn chat(&self, _request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        match &self.follow_up_json {
            Some(json) => Ok(json.clone()),
            None => Err(ApiError::Upstream("follow-up provider down".to_string())),
        }
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
        _model_id: &str,
    ) -> Result<mpsc::Receiver<Result<ChatDelta, ApiError>>, ApiError> {
        self.captured_stream_requests.lock().unwrap().push(request);

        let (tx, rx) = mpsc::channel(32);
        let deltas = self.deltas.clone();
        tokio::spawn(async move {
            for delta in deltas {
                if tx.send(Ok(delta)).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if self.fail_embeddings {
            return Err(ApiError::Upstream("embeddings down".to_string()));
        }
        Ok(inputs.iter().map(|text| embed_text(text)).collect())
    }
}

/// Search fake serving pre-baked results and recording the requested
/// web-search count.
pub struct FakeSearchProvider {
    pub sources: Vec<SourceReference>,
    pub images: Vec<ImageResult>,
    pub videos: Vec<VideoResult>,
    pub requested_counts: Mutex<Vec<usize>>,
    pub fail_web_search: bool,
    /// Delay applied to image/video searches, for ordering-sensitive tests.
    pub media_delay: Option<Duration>,
}

impl FakeSearchProvider {
    pub fn new(sources: Vec<SourceReference>) -> Self {
        Self {
            sources,
            images: Vec::new(),
            videos: Vec::new(),
            requested_counts: Mutex::new(Vec::new()),
            fail_web_search: false,
            media_delay: None,
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearchProvider {
    async fn search(&self, _query: &str, count: usize) -> Result<Vec<SourceReference>, ApiError> {
        self.requested_counts.lock().unwrap().push(count);
        if self.fail_web_search {
            return Err(ApiError::Upstream("search provider down".to_string()));
        }
        Ok(self.sources.iter().take(count).cloned().collect())
    }

    async fn search_images(&self, _query: &str) -> Result<Vec<ImageResult>, ApiError> {
        if let Some(delay) = self.media_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.images.clone())
    }

    async fn search_videos(&self, _query: &str) -> Result<Vec<VideoResult>, ApiError> {
        if let Some(delay) = self.media_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.videos.clone())
    }
}

/// Spawns a local upstream serving pages and media probes:
/// `/page/one`, `/page/two` (html), `/page/slow` (stalls), `/page/missing`
/// (404), `/img/ok*` (image content-type), `/img/bad*` (html content-type).
pub async fn spawn_upstream() -> String {
    let app = Router::new()
        .route(
            "/page/one",
            get(|| async {
                axum::response::Html(
                    "<html><head><script>x()</script></head><body>\
                     <nav>menu</nav><p>Alpha evidence body about the query topic.</p>\
                     </body></html>",
                )
            }),
        )
        .route(
            "/page/two",
            get(|| async {
                axum::response::Html(
                    "<html><body><p>Beta evidence body with different wording.</p>\
                     <footer>footer junk</footer></body></html>",
                )
            }),
        )
        .route(
            "/page/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                axum::response::Html("<p>too late</p>")
            }),
        )
        .route(
            "/page/missing",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
        )
        .route("/img/ok", get(image_ok))
        .route("/img/bad", get(image_bad))
        .route("/img/ok/:id", get(image_ok_with_id))
        .route("/img/bad/:id", get(image_bad_with_id));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream serve");
    });

    format!("http://{}", addr)
}

async fn image_ok() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], vec![0x89u8, 0x50])
}

async fn image_bad() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html")], "<html></html>".to_string())
}

async fn image_ok_with_id(Path(_id): Path<String>) -> impl IntoResponse {
    image_ok().await
}

async fn image_bad_with_id(Path(_id): Path<String>) -> impl IntoResponse {
    image_bad().await
}

pub fn source(title: &str, link: String) -> SourceReference {
    SourceReference {
        title: title.to_string(),
        link,
        favicon: String::new(),
    }
}

/// Settings tuned for fast tests: short fetch timeout, small chunks.
pub fn test_settings() -> beacon_backend::core::config::Settings {
    let mut settings = beacon_backend::core::config::Settings::default();
    settings.fetch_timeout_ms = 300;
    settings.chunk_size = 80;
    settings.chunk_overlap = 10;
    settings
}
