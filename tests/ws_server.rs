//! Websocket transport round trip against the real router.

mod common;

use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use beacon_backend::llm::ChatDelta;
use beacon_backend::server::router::router;
use beacon_backend::state::AppState;

use common::{source, spawn_upstream, test_settings, FakeChatModel, FakeSearchProvider};

async fn spawn_app(state: Arc<AppState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind app");
    let addr = listener.local_addr().expect("app addr");
    let app = router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("app serve");
    });
    format!("ws://{}/ws", addr)
}

async fn read_frames_until_done(
    ws: &mut (impl Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Some(Ok(msg)) = ws.next().await {
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(&text).expect("json frame");
            let frame_type = frame["type"].as_str().unwrap_or_default().to_string();
            frames.push(frame);
            if frame_type == "done" || frame_type == "error" {
                break;
            }
        }
    }
    frames
}

#[tokio::test]
async fn submitted_query_streams_ordered_frames_over_the_socket() {
    let upstream = spawn_upstream().await;

    let model = Arc::new(FakeChatModel::new(vec![
        ChatDelta::Token("Hello ".to_string()),
        ChatDelta::Token("from ".to_string()),
        ChatDelta::Token("the socket.".to_string()),
        ChatDelta::Stop,
    ]));
    let search = Arc::new(FakeSearchProvider::new(vec![source(
        "Alpha",
        format!("{}/page/one", upstream),
    )]));

    let state = AppState::with_providers(
        test_settings(),
        model,
        search,
        reqwest::Client::new(),
    );
    let url = spawn_app(state).await;

    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");
    ws.send(Message::Text(
        json!({"message": "what is alpha?"}).to_string().into(),
    ))
    .await
    .expect("send");

    let frames = read_frames_until_done(&mut ws).await;
    let types: Vec<&str> = frames
        .iter()
        .map(|f| f["type"].as_str().unwrap_or_default())
        .collect();

    assert_eq!(types.last(), Some(&"done"));
    let search_at = types.iter().position(|t| *t == "searchResults").unwrap();
    let fragment_at = types.iter().position(|t| *t == "llmResponse").unwrap();
    assert!(search_at < fragment_at);

    let answer: String = frames
        .iter()
        .filter(|f| f["type"] == "llmResponse")
        .filter_map(|f| f["data"].as_str())
        .collect();
    assert_eq!(answer, "Hello from the socket.");

    // the connection stays usable for the next turn
    ws.send(Message::Text(
        json!({"message": "and again?"}).to_string().into(),
    ))
    .await
    .expect("send second");
    let frames = read_frames_until_done(&mut ws).await;
    assert!(!frames.is_empty());
    assert_eq!(frames.last().unwrap()["type"], "done");
}

#[tokio::test]
async fn provider_failure_surfaces_as_a_single_error_frame() {
    let model = Arc::new(FakeChatModel::new(vec![ChatDelta::Stop]));
    let mut search = FakeSearchProvider::new(Vec::new());
    search.fail_web_search = true;
    search.media_delay = Some(std::time::Duration::from_millis(300));
    let search = Arc::new(search);

    let state = AppState::with_providers(
        test_settings(),
        model,
        search,
        reqwest::Client::new(),
    );
    let url = spawn_app(state).await;

    let (mut ws, _) = connect_async(url.as_str()).await.expect("connect");
    ws.send(Message::Text(json!({"message": "q"}).to_string().into()))
        .await
        .expect("send");

    let frames = read_frames_until_done(&mut ws).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "error");
    assert!(frames[0]["message"].as_str().unwrap_or_default().len() > 0);
}
