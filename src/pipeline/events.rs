//! The incremental event protocol between the pipeline and its consumer.
//!
//! Events arrive in the order they become available and only ever append
//! or terminate; there are no sequence numbers and no reordering. The
//! event stream is the single synchronization primitive between the
//! server-side pipeline and the client-side turn reducer.

use serde::{Deserialize, Serialize};

use crate::tools::search::{ImageResult, SourceReference, VideoResult};

/// Three suggested next questions, generated once per turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpSet {
    pub original: String,
    #[serde(rename = "followUp")]
    pub follow_up: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoneStatus {
    /// The run delivered everything, follow-ups included.
    Complete,
    /// The answer was delivered but follow-up generation failed.
    Degraded,
}

/// One incremental unit of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Web search resolved; ordered result list.
    SearchResults(Vec<SourceReference>),
    /// Image search resolved; links verified as image content.
    Images(Vec<ImageResult>),
    /// Video search resolved; thumbnails verified as image content.
    Videos(Vec<VideoResult>),
    /// One non-empty generation fragment.
    LlmResponse(String),
    /// The generation provider signalled its stop condition.
    LlmResponseEnd(bool),
    /// Follow-up generation completed.
    FollowUp(FollowUpSet),
    /// Terminal marker; nothing follows.
    Done(DoneStatus),
}
