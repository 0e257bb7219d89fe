// Database module
// SQLite ledger of index runs and the Weaviate vector store

pub mod sqlite;
pub mod weaviate;

pub use sqlite::*;
