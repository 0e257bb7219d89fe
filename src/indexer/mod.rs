// Indexer module
// Turns a PDF into embedded chunks in the vector store and records each run in the ledger


use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::database::sqlite::Database;
use crate::database::weaviate::{ChunkRecord, VectorStore};
use crate::document::DocSplitter;
use crate::embeddings::chunking::TextChunk;
use crate::embeddings::ollama::OllamaClient;
use crate::{RagError, Result};

const PREVIEW_CHUNKS: usize = 3;
const PREVIEW_CHARS: usize = 100;
const PREVIEW_VALUES: usize = 5;

/// Outcome of one indexing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub doc_id: String,
    /// Chunks produced by the splitter
    pub chunks: usize,
    /// Records inserted into the vector store
    pub stored: usize,
    /// Embedding dimension, `None` when nothing was embedded
    pub dimension: Option<usize>,
    /// Ledger row for this run
    pub run_id: Option<i64>,
}

/// What indexing a PDF would produce, without storing anything
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub page_count: usize,
    pub char_count: usize,
    pub chunk_count: usize,
    /// Leading characters of the first chunks
    pub previews: Vec<String>,
    pub dimension: Option<usize>,
    /// Leading values of the first chunk's embedding
    pub sample_values: Vec<f32>,
}

pub struct Indexer {
    splitter: DocSplitter,
    embedder: OllamaClient,
    store: VectorStore,
    database: Database,
    default_doc_id: String,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(config: &Config, database: Database) -> Result<Self> {
        Ok(Self {
            splitter: DocSplitter::new(config.chunking)?,
            embedder: OllamaClient::new(config)?,
            store: VectorStore::new(config)?,
            database,
            default_doc_id: config.retrieval.default_doc_id.clone(),
            show_progress: false,
        })
    }

    #[inline]
    pub fn from_parts(
        splitter: DocSplitter,
        embedder: OllamaClient,
        store: VectorStore,
        database: Database,
    ) -> Self {
        Self {
            splitter,
            embedder,
            store,
            database,
            default_doc_id: crate::config::settings::DEFAULT_DOC_ID.to_string(),
            show_progress: false,
        }
    }

    /// Draw a progress bar on stderr while storing chunks
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Extract, split, embed and store the PDF at `path`.
    ///
    /// Every call stores a fresh copy of every chunk. A failure partway leaves the
    /// records stored so far in place; their number is part of the error and of the
    /// failed ledger entry.
    pub async fn index_pdf(&self, path: &Path, doc_id: Option<&str>) -> Result<IndexReport> {
        let doc_id = doc_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(self.default_doc_id.as_str())
            .to_string();

        info!("Indexing {} as {}", path.display(), doc_id);
        let run = self.database.start_run(&doc_id, path).await?;

        let split = match self.splitter.split_file(path) {
            Ok(split) => split,
            Err(e) => {
                self.record_failure(run.id, 0, &e).await;
                return Err(e);
            }
        };

        if let Err(e) = self.database.mark_indexing(run.id, split.chunks.len()).await {
            warn!("Failed to update index run {}: {:#}", run.id, e);
        }

        let mut stored = 0;
        match self.store_chunks(&split.chunks, &doc_id, &mut stored) {
            Ok(dimension) => {
                if let Err(e) = self
                    .database
                    .complete_run(run.id, split.chunks.len(), stored)
                    .await
                {
                    warn!("Failed to complete index run {}: {:#}", run.id, e);
                }

                info!(
                    "Stored {} of {} chunks from {} as {}",
                    stored,
                    split.chunks.len(),
                    path.display(),
                    doc_id
                );

                Ok(IndexReport {
                    doc_id,
                    chunks: split.chunks.len(),
                    stored,
                    dimension,
                    run_id: Some(run.id),
                })
            }
            Err(e) => {
                self.record_failure(run.id, stored, &e).await;
                Err(with_stored_count(e, stored, split.chunks.len()))
            }
        }
    }

    /// Embed and store already split chunks without touching the ledger
    #[inline]
    pub fn index_chunks(&self, chunks: &[TextChunk], doc_id: &str) -> Result<IndexReport> {
        let mut stored = 0;
        let dimension = self
            .store_chunks(chunks, doc_id, &mut stored)
            .map_err(|e| with_stored_count(e, stored, chunks.len()))?;

        Ok(IndexReport {
            doc_id: doc_id.to_string(),
            chunks: chunks.len(),
            stored,
            dimension,
            run_id: None,
        })
    }

    /// Split the PDF at `path` and embed its first chunk, storing nothing
    #[inline]
    pub fn preview(&self, path: &Path) -> Result<Preview> {
        preview(&self.splitter, &self.embedder, path)
    }

    /// Embed `chunks` batch by batch and insert one record per chunk.
    ///
    /// `stored` counts successful inserts and stays valid when an error is returned.
    fn store_chunks(
        &self,
        chunks: &[TextChunk],
        doc_id: &str,
        stored: &mut usize,
    ) -> Result<Option<usize>> {
        if self.store.ensure_schema()? {
            info!("Created vector store class {}", self.store.class_name());
        }

        if chunks.is_empty() {
            warn!("No text to index for {}", doc_id);
            return Ok(None);
        }

        let bar = self.progress_bar(chunks.len());
        let mut dimension: Option<usize> = None;

        for batch in chunks.chunks(self.embedder.batch_size().max(1)) {
            let embeddings = self
                .embedder
                .generate_chunk_embeddings(batch)
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                let expected = *dimension.get_or_insert(embedding.embedding.len());
                if embedding.embedding.len() != expected {
                    return Err(RagError::Embedding(format!(
                        "Chunk {} has a {}-dimensional embedding, expected {}",
                        chunk.chunk_index,
                        embedding.embedding.len(),
                        expected
                    )));
                }

                let chunk_index = u32::try_from(chunk.chunk_index).map_err(|_| {
                    RagError::Document(format!("Chunk index {} out of range", chunk.chunk_index))
                })?;
                let record = ChunkRecord::new(
                    chunk.content.clone(),
                    doc_id.to_string(),
                    chunk_index,
                    embedding.embedding,
                );

                self.store.insert(&record)?;
                *stored += 1;
                bar.inc(1);
            }

            debug!("Stored batch of {} chunks for {}", batch.len(), doc_id);
        }

        bar.finish_and_clear();
        Ok(dimension)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} chunks stored")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar
    }

    async fn record_failure(&self, run_id: i64, stored: usize, err: &RagError) {
        error!("Index run {} failed after storing {} chunks: {}", run_id, stored, err);
        if let Err(e) = self.database.fail_run(run_id, stored, &err.to_string()).await {
            warn!("Failed to record failure of index run {}: {:#}", run_id, e);
        }
    }
}

/// Split the PDF at `path` and embed its first chunk.
///
/// Needs neither the vector store nor the ledger.
#[inline]
pub fn preview(splitter: &DocSplitter, embedder: &OllamaClient, path: &Path) -> Result<Preview> {
    let split = splitter.split_file(path)?;

    let previews = split
        .chunks
        .iter()
        .take(PREVIEW_CHUNKS)
        .map(|c| c.content.chars().take(PREVIEW_CHARS).collect())
        .collect();

    let sample = match split.chunks.first() {
        Some(chunk) => Some(
            embedder
                .generate_embedding(&chunk.content)
                .map_err(|e| RagError::Embedding(format!("{:#}", e)))?
                .embedding,
        ),
        None => None,
    };

    Ok(Preview {
        page_count: split.document.page_count(),
        char_count: split.char_count,
        chunk_count: split.chunks.len(),
        previews,
        dimension: sample.as_ref().map(Vec::len),
        sample_values: sample
            .map(|v| v.into_iter().take(PREVIEW_VALUES).collect())
            .unwrap_or_default(),
    })
}

/// Note how far a failed run got before the error
fn with_stored_count(err: RagError, stored: usize, total: usize) -> RagError {
    let note = format!("stored {} of {} chunks before the failure", stored, total);
    match err {
        RagError::Config(msg) => RagError::Config(format!("{} ({})", msg, note)),
        RagError::Database(msg) => RagError::Database(format!("{} ({})", msg, note)),
        RagError::Network(msg) => RagError::Network(format!("{} ({})", msg, note)),
        RagError::Embedding(msg) => RagError::Embedding(format!("{} ({})", msg, note)),
        RagError::Document(msg) => RagError::Document(format!("{} ({})", msg, note)),
        RagError::Llm(msg) => RagError::Llm(format!("{} ({})", msg, note)),
        RagError::Input(msg) => RagError::Input(format!("{} ({})", msg, note)),
        RagError::Io(e) => RagError::Other(anyhow::Error::new(e).context(note)),
        RagError::Other(e) => RagError::Other(e.context(note)),
    }
}
