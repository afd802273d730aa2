//! Follow-up question generation.
//!
//! Runs once, after the answer is complete, as a single non-streamed
//! call. Failure here never erases the delivered answer: the caller
//! degrades the turn instead.

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::pipeline::events::FollowUpSet;
use crate::tools::search::SourceReference;

pub async fn follow_ups(
    model: &dyn ChatModel,
    chat_model: &str,
    sources: &[SourceReference],
    query: &str,
) -> Result<FollowUpSet, ApiError> {
    let titles: Vec<&str> = sources.iter().map(|s| s.title.as_str()).collect();
    let system = format!(
        "Given the question and the titles of the sources used to answer it, \
         suggest exactly three follow-up questions. Respond with JSON only, \
         in the shape {{\"original\": \"...\", \"followUp\": [\"...\", \"...\", \"...\"]}}.\n\
         Source titles:\n{}",
        titles.join("\n")
    );

    let request = ChatRequest::new(vec![
        ChatMessage::system(system),
        ChatMessage::user(query),
    ]);

    let raw = model.chat(request, chat_model).await?;
    parse_follow_ups(&raw, query)
}

/// Extracts the JSON object from the model output and validates it.
///
/// Models wrap JSON in prose or code fences often enough that the parse
/// scans from the first `{` to the last `}`.
fn parse_follow_ups(raw: &str, query: &str) -> Result<FollowUpSet, ApiError> {
    let start = raw
        .find('{')
        .ok_or_else(|| ApiError::Upstream("follow-up output contains no JSON".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| ApiError::Upstream("follow-up output contains no JSON".to_string()))?;
    if end < start {
        return Err(ApiError::Upstream(
            "follow-up output contains no JSON".to_string(),
        ));
    }

    let mut parsed: FollowUpSet = serde_json::from_str(&raw[start..=end])
        .map_err(|err| ApiError::Upstream(format!("invalid follow-up JSON: {}", err)))?;

    if parsed.follow_up.len() != 3 {
        return Err(ApiError::Upstream(format!(
            "expected 3 follow-up questions, got {}",
            parsed.follow_up.len()
        )));
    }

    if parsed.original.is_empty() {
        parsed.original = query.to_string();
    }

    Ok(parsed)
}
