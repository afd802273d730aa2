//! Ephemeral per-request similarity index over evidence chunks.
//!
//! The index is built once from the surviving pages, queried once with
//! the user query and then dropped; nothing is shared across requests.

use crate::core::errors::ApiError;
use crate::llm::ChatModel;
use crate::rag::chunker::{chunk_pages, TextChunk};
use crate::tools::fetch::FetchedPage;
use crate::tools::vector_math;

/// A chunk selected by similarity search, ranked by descending score.
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub chunk: TextChunk,
    pub score: f32,
}

pub struct SimilarityIndex {
    entries: Vec<(Vec<f32>, TextChunk)>,
}

impl SimilarityIndex {
    pub fn new(embeddings: Vec<Vec<f32>>, chunks: Vec<TextChunk>) -> Self {
        debug_assert_eq!(embeddings.len(), chunks.len());
        Self {
            entries: embeddings.into_iter().zip(chunks).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns at most `k` passages ranked by cosine similarity to the
    /// query embedding. Ties keep insertion order; an empty index yields
    /// an empty list, never an error.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<RetrievedPassage> {
        if self.entries.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<Vec<f32>> = self
            .entries
            .iter()
            .map(|(embedding, _)| embedding.clone())
            .collect();

        let ranking = match vector_math::rank_descending_by_cosine(query_embedding, &candidates) {
            Ok(scores) => scores,
            Err(err) => {
                tracing::warn!("similarity ranking failed, returning no passages: {}", err);
                return Vec::new();
            }
        };

        ranking
            .into_iter()
            .take(k)
            .filter_map(|(idx, score)| {
                self.entries.get(idx).map(|(_, chunk)| RetrievedPassage {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect()
    }
}

/// Chunks the pages, embeds query and chunks in one batch, builds the
/// index and retrieves the top `k` passages for the query.
///
/// Zero chunks short-circuit to an empty passage list without touching
/// the embedding provider. Embedding failures are stage failures.
pub async fn retrieve_passages(
    model: &dyn ChatModel,
    embedding_model: &str,
    pages: &[FetchedPage],
    query: &str,
    chunk_size: usize,
    overlap: usize,
    k: usize,
) -> Result<Vec<RetrievedPassage>, ApiError> {
    let chunks = chunk_pages(pages, chunk_size, overlap);
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let mut inputs = Vec::with_capacity(chunks.len() + 1);
    inputs.push(query.to_string());
    for chunk in &chunks {
        inputs.push(chunk.text.clone());
    }

    let mut embeddings = model.embed(&inputs, embedding_model).await?;
    if embeddings.len() != inputs.len() {
        return Err(ApiError::Upstream(format!(
            "embedding count mismatch: {} != {}",
            embeddings.len(),
            inputs.len()
        )));
    }

    let query_embedding = embeddings.remove(0);
    let index = SimilarityIndex::new(embeddings, chunks);
    tracing::debug!("similarity index built with {} chunks", index.len());

    Ok(index.search(&query_embedding, k))
}
