// Weaviate vector database module
// Handles vector storage and similarity search for chunk embeddings

pub mod vector_store;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use vector_store::VectorStore;

/// A chunk and its embedding as stored in Weaviate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Object id; a fresh random UUID, so re-indexing never overwrites
    pub id: Uuid,
    /// The vector embedding (384 dimensions for all-minilm)
    pub vector: Vec<f32>,
    /// The chunk text
    pub content: String,
    /// Document the chunk was taken from
    pub doc_id: String,
    /// Index of this chunk within its document
    pub chunk_index: u32,
}

impl ChunkRecord {
    #[inline]
    pub fn new(content: String, doc_id: String, chunk_index: u32, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            content,
            doc_id,
            chunk_index,
        }
    }
}

/// A stored chunk returned by nearest-vector search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub doc_id: Option<String>,
    pub chunk_index: Option<u32>,
    /// Vector distance to the query; smaller is closer
    pub distance: Option<f32>,
}

/// Server information reported by `/v1/meta`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WeaviateMeta {
    pub version: String,
    pub hostname: Option<String>,
}
