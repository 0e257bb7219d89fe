// Embeddings module
// Fixed-window text chunking and Ollama embedding generation

pub mod chunking;
pub mod ollama;

pub use chunking::{
    ChunkingConfig, TextChunk, estimate_token_count, expected_chunk_count, split_text,
};
pub use ollama::{EmbeddingResult, OllamaClient};
