//! Sliding-window chunking of evidence text.

use crate::tools::fetch::FetchedPage;

/// A contiguous window of a fetched page's text, tagged with its source
/// for attribution. Chunks live for one request only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub source_title: String,
    pub source_link: String,
}

/// Splits `text` into chunks of `chunk_size` characters where consecutive
/// chunks share exactly `overlap` characters.
///
/// Windows are cut at fixed character offsets, not sentence boundaries;
/// trimming the leading `overlap` characters from every chunk after the
/// first and concatenating recovers the input exactly. Empty text yields
/// no chunks. The step is clamped to at least one character so an
/// overlap at or above the chunk size cannot stall the walk.
pub fn split_into_chunks(
    text: &str,
    source_title: &str,
    source_link: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();

    let mut chunks = Vec::new();
    if total_chars == 0 || chunk_size == 0 {
        return chunks;
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(total_chars);
        chunks.push(TextChunk {
            text: chars[start..end].iter().collect(),
            source_title: source_title.to_string(),
            source_link: source_link.to_string(),
        });

        if end == total_chars {
            break;
        }
        start += step;
    }

    chunks
}

/// Chunks every surviving page. Pages with empty text contribute nothing.
pub fn chunk_pages(pages: &[FetchedPage], chunk_size: usize, overlap: usize) -> Vec<TextChunk> {
    pages
        .iter()
        .flat_map(|page| {
            split_into_chunks(
                &page.text,
                &page.source.title,
                &page.source.link,
                chunk_size,
                overlap,
            )
        })
        .collect()
}
