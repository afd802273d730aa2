//! The retrieval-augmented answer pipeline.
//!
//! One `submit` call drives the full lifecycle of a turn: concurrent
//! web/image/video discovery, timeboxed page fetches, the ephemeral
//! similarity index, the streamed grounded answer, follow-up questions
//! and the terminal marker. Everything is multiplexed in causal order
//! onto a single event channel; the receiver side is the only
//! synchronization the consumer needs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::config::Settings;
use crate::core::errors::ApiError;
use crate::llm::{ChatDelta, ChatModel};
use crate::pipeline::events::{DoneStatus, StreamEvent};
use crate::pipeline::{followup, generator};
use crate::rag::retrieve_passages;
use crate::tools::fetch::{fetch_pages, verify_image_results, verify_video_results};
use crate::tools::search::SearchProvider;

/// Handle to the lazily produced event sequence of one turn.
pub struct TurnStream {
    pub turn_id: u64,
    pub events: mpsc::Receiver<Result<StreamEvent, ApiError>>,
}

/// Orchestrates one answer run per submitted query.
///
/// All collaborators are injected at construction; tests substitute
/// fakes through the trait objects.
#[derive(Clone)]
pub struct AnswerPipeline {
    settings: Settings,
    model: Arc<dyn ChatModel>,
    search: Arc<dyn SearchProvider>,
    client: Client,
    next_turn_id: Arc<AtomicU64>,
}

type EventSender = mpsc::Sender<Result<StreamEvent, ApiError>>;

/// Sends one event; false means the consumer abandoned the stream and
/// the producer should wind down.
async fn emit(tx: &EventSender, event: StreamEvent) -> bool {
    tx.send(Ok(event)).await.is_ok()
}

async fn emit_failure(tx: &EventSender, err: ApiError) {
    tracing::error!("pipeline run failed: {}", err);
    let _ = tx.send(Err(err)).await;
}

impl AnswerPipeline {
    pub fn new(
        settings: Settings,
        model: Arc<dyn ChatModel>,
        search: Arc<dyn SearchProvider>,
        client: Client,
    ) -> Self {
        Self {
            settings,
            model,
            search,
            client,
            next_turn_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Starts a run for `query` and returns the event stream handle.
    ///
    /// Production begins immediately; the caller may consume at its own
    /// pace. Dropping the receiver cancels the run opportunistically at
    /// the next emission.
    pub fn submit(&self, query: impl Into<String>) -> TurnStream {
        let query = query.into();
        let turn_id = self.next_turn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(64);

        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.drive(query, tx).await;
        });

        TurnStream {
            turn_id,
            events: rx,
        }
    }

    async fn drive(&self, query: String, tx: EventSender) {
        let fetch_timeout = Duration::from_millis(self.settings.fetch_timeout_ms);

        // Image and video discovery run alongside everything below and
        // report the moment they resolve.
        let images_task = self.spawn_image_search(&query, tx.clone(), fetch_timeout);
        let videos_task = self.spawn_video_search(&query, tx.clone(), fetch_timeout);

        let sources = match self
            .search
            .search(&query, self.settings.pages_to_scan)
            .await
        {
            Ok(sources) => sources,
            Err(err) => {
                images_task.abort();
                videos_task.abort();
                emit_failure(&tx, err).await;
                return;
            }
        };

        if !emit(&tx, StreamEvent::SearchResults(sources.clone())).await {
            images_task.abort();
            videos_task.abort();
            return;
        }

        // Fetches are concurrent and individually timeboxed; a dead or
        // slow page drops out without holding up the batch.
        let pages = fetch_pages(&self.client, &sources, fetch_timeout).await;
        tracing::info!(
            "fetched {} of {} pages for turn evidence",
            pages.len(),
            sources.len()
        );

        let passages = match retrieve_passages(
            self.model.as_ref(),
            &self.settings.embedding_model,
            &pages,
            &query,
            self.settings.chunk_size,
            self.settings.chunk_overlap,
            self.settings.top_passages,
        )
        .await
        {
            Ok(passages) => passages,
            Err(err) => {
                images_task.abort();
                videos_task.abort();
                emit_failure(&tx, err).await;
                return;
            }
        };

        let mut stream = match generator::generate(
            self.model.as_ref(),
            &self.settings.chat_model,
            &query,
            &passages,
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => {
                images_task.abort();
                videos_task.abort();
                emit_failure(&tx, err).await;
                return;
            }
        };

        while let Some(delta) = stream.recv().await {
            match delta {
                Ok(ChatDelta::Token(token)) => {
                    if !emit(&tx, StreamEvent::LlmResponse(token)).await {
                        images_task.abort();
                        videos_task.abort();
                        return;
                    }
                }
                // Stop or a closed provider channel both end the answer.
                Ok(ChatDelta::Stop) => break,
                Err(err) => {
                    images_task.abort();
                    videos_task.abort();
                    emit_failure(&tx, err).await;
                    return;
                }
            }
        }

        if !emit(&tx, StreamEvent::LlmResponseEnd(true)).await {
            images_task.abort();
            videos_task.abort();
            return;
        }

        // Earliest point the driver can observe the media tasks without
        // serializing discovery. A provider failure there fails the run.
        if let Some(err) = join_media_task(images_task).await {
            videos_task.abort();
            emit_failure(&tx, err).await;
            return;
        }
        if let Some(err) = join_media_task(videos_task).await {
            emit_failure(&tx, err).await;
            return;
        }

        let status = match followup::follow_ups(
            self.model.as_ref(),
            &self.settings.chat_model,
            &sources,
            &query,
        )
        .await
        {
            Ok(set) => {
                if !emit(&tx, StreamEvent::FollowUp(set)).await {
                    return;
                }
                DoneStatus::Complete
            }
            Err(err) => {
                // The answer already reached the consumer; losing the
                // follow-ups only degrades the turn.
                tracing::warn!("follow-up generation failed: {}", err);
                DoneStatus::Degraded
            }
        };

        let _ = emit(&tx, StreamEvent::Done(status)).await;
    }

    fn spawn_image_search(
        &self,
        query: &str,
        tx: EventSender,
        timeout: Duration,
    ) -> JoinHandle<Result<(), ApiError>> {
        let search = self.search.clone();
        let client = self.client.clone();
        let cap = self.settings.media_results;
        let query = query.to_string();

        tokio::spawn(async move {
            let candidates = search.search_images(&query).await?;
            let verified = verify_image_results(&client, candidates, cap, timeout).await;
            let _ = emit(&tx, StreamEvent::Images(verified)).await;
            Ok(())
        })
    }

    fn spawn_video_search(
        &self,
        query: &str,
        tx: EventSender,
        timeout: Duration,
    ) -> JoinHandle<Result<(), ApiError>> {
        let search = self.search.clone();
        let client = self.client.clone();
        let cap = self.settings.media_results;
        let query = query.to_string();

        tokio::spawn(async move {
            let candidates = search.search_videos(&query).await?;
            let verified = verify_video_results(&client, candidates, cap, timeout).await;
            let _ = emit(&tx, StreamEvent::Videos(verified)).await;
            Ok(())
        })
    }
}

async fn join_media_task(handle: JoinHandle<Result<(), ApiError>>) -> Option<ApiError> {
    match handle.await {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(join_err) if join_err.is_cancelled() => None,
        Err(join_err) => Some(ApiError::internal(join_err)),
    }
}
