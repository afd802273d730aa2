pub mod chunker;
pub mod index;

pub use chunker::{chunk_pages, split_into_chunks, TextChunk};
pub use index::{retrieve_passages, RetrievedPassage, SimilarityIndex};
