//! Timeboxed page fetching and media link verification.
//!
//! Every fetch is an independent, fallible, timeboxed operation. A page
//! that times out or answers non-2xx is dropped from the evidence set;
//! it is not retried and it never fails the surrounding batch.

use std::time::Duration;

use futures_util::future::join_all;
use reqwest::Client;

use crate::tools::extract::extract_text;
use crate::tools::search::{ImageResult, SourceReference, VideoResult};

/// A search hit whose page content survived fetch and extraction.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub source: SourceReference,
    pub text: String,
}

/// Fetches all sources concurrently, each bound by `timeout`.
///
/// Results keep the order of `sources`; failed fetches are absent.
pub async fn fetch_pages(
    client: &Client,
    sources: &[SourceReference],
    timeout: Duration,
) -> Vec<FetchedPage> {
    let fetches = sources
        .iter()
        .map(|source| fetch_page(client, source, timeout));

    join_all(fetches).await.into_iter().flatten().collect()
}

async fn fetch_page(
    client: &Client,
    source: &SourceReference,
    timeout: Duration,
) -> Option<FetchedPage> {
    let request = async {
        let response = client.get(&source.link).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.text().await.ok()
    };

    match tokio::time::timeout(timeout, request).await {
        Ok(Some(html)) => Some(FetchedPage {
            source: source.clone(),
            text: extract_text(&html),
        }),
        Ok(None) => {
            tracing::debug!("dropping {}: fetch failed", source.link);
            None
        }
        Err(_) => {
            tracing::debug!("dropping {}: fetch timed out", source.link);
            None
        }
    }
}

/// Keeps only image results whose link answers with an `image/*`
/// content-type. Relative order is preserved; output is capped at `cap`.
pub async fn verify_image_results(
    client: &Client,
    items: Vec<ImageResult>,
    cap: usize,
    timeout: Duration,
) -> Vec<ImageResult> {
    let candidates: Vec<ImageResult> = items.into_iter().take(cap).collect();
    let checks = candidates
        .iter()
        .map(|item| is_image_link(client, &item.link, timeout));
    let verdicts = join_all(checks).await;

    candidates
        .into_iter()
        .zip(verdicts)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

/// Keeps only video results whose thumbnail answers with an `image/*`
/// content-type. Relative order is preserved; output is capped at `cap`.
pub async fn verify_video_results(
    client: &Client,
    items: Vec<VideoResult>,
    cap: usize,
    timeout: Duration,
) -> Vec<VideoResult> {
    let candidates: Vec<VideoResult> = items.into_iter().take(cap).collect();
    let checks = candidates
        .iter()
        .map(|item| is_image_link(client, &item.image_url, timeout));
    let verdicts = join_all(checks).await;

    candidates
        .into_iter()
        .zip(verdicts)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect()
}

async fn is_image_link(client: &Client, link: &str, timeout: Duration) -> bool {
    let request = async {
        let response = client.head(link).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("image/"))
    };

    match tokio::time::timeout(timeout, request).await {
        Ok(Some(true)) => true,
        Ok(_) => {
            tracing::debug!("dropping {}: not verified image content", link);
            false
        }
        Err(_) => {
            tracing::debug!("dropping {}: content-type check timed out", link);
            false
        }
    }
}
