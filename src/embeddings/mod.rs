// Retrieval pipeline: extraction, chunking, embedding, similarity and ranking

pub mod document_processor;
#[cfg(feature = "fastembed")]
pub mod fastembed;
pub mod gemini;
pub mod hash;
pub mod openai;
pub mod provider;
pub mod similarity;
pub mod text_chunker;
pub mod vector_search;

pub use document_processor::*;
pub use provider::{Embedder, EmbeddingProvider};
pub use similarity::cosine_similarity;
pub use text_chunker::chunk_text;
pub use vector_search::*;
