//! Grounded answer generation.

use tokio::sync::mpsc;

use crate::core::errors::ApiError;
use crate::llm::{ChatDelta, ChatMessage, ChatModel, ChatRequest};
use crate::rag::RetrievedPassage;

/// The answer the model must produce verbatim when the evidence set is
/// empty or irrelevant to the query.
pub const FALLBACK_ANSWER: &str = "No relevant results found.";

/// Builds the grounded prompt for the streaming answer call.
///
/// The system instruction mandates markdown output and the literal
/// fallback answer; the contract holds with an empty passage list, which
/// is how a run with zero surviving pages still produces a response.
pub fn build_messages(query: &str, passages: &[RetrievedPassage]) -> Vec<ChatMessage> {
    let mut context = String::new();
    for passage in passages {
        context.push_str(&format!(
            "[{}]({})\n{}\n\n",
            passage.chunk.source_title, passage.chunk.source_link, passage.chunk.text
        ));
    }

    let system = format!(
        "You are a research assistant. Answer the user's question using only \
         the sources below. Format the answer in markdown. If the sources are \
         empty or do not contain relevant information, reply with exactly: \
         \"{}\"\n\nSources:\n{}",
        FALLBACK_ANSWER, context
    );

    vec![ChatMessage::system(system), ChatMessage::user(query)]
}

/// Opens the token-streaming generation call for `query` grounded in
/// `passages`. The receiver yields non-empty fragments in arrival order
/// and terminates with `ChatDelta::Stop`.
pub async fn generate(
    model: &dyn ChatModel,
    chat_model: &str,
    query: &str,
    passages: &[RetrievedPassage],
) -> Result<mpsc::Receiver<Result<ChatDelta, ApiError>>, ApiError> {
    let request = ChatRequest::new(build_messages(query, passages));
    model.stream_chat(request, chat_model).await
}
