// Document module
// PDF text extraction and the splitter that turns a PDF into chunks


use lopdf::Document;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::embeddings::chunking::{ChunkingConfig, TextChunk, split_text};
use crate::{RagError, Result};

/// Text extracted from a PDF, one entry per page in page order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub pages: Vec<String>,
}

impl ExtractedDocument {
    /// All page texts concatenated in page order
    #[inline]
    pub fn text(&self) -> String {
        self.pages.concat()
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// A PDF after extraction and splitting
#[derive(Debug, Clone)]
pub struct SplitDocument {
    pub document: ExtractedDocument,
    pub char_count: usize,
    pub chunks: Vec<TextChunk>,
}

/// Extract the text of every page of the PDF at `path`.
///
/// Fails if the file cannot be opened or parsed, or if any page's text cannot be
/// decoded; nothing is returned for a partially readable file.
#[inline]
pub fn extract_document<P: AsRef<Path>>(path: P) -> Result<ExtractedDocument> {
    let path = path.as_ref();
    debug!("Extracting text from PDF: {}", path.display());

    if !path.is_file() {
        return Err(RagError::Document(format!(
            "PDF not found: {}",
            path.display()
        )));
    }

    let document = Document::load(path).map_err(|e| {
        RagError::Document(format!("Failed to parse PDF {}: {}", path.display(), e))
    })?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let text = document.extract_text(&[page_number]).map_err(|e| {
            RagError::Document(format!(
                "Failed to extract text from page {} of {}: {}",
                page_number,
                path.display(),
                e
            ))
        })?;
        pages.push(text);
    }

    info!(
        "Extracted {} pages ({} characters) from {}",
        pages.len(),
        pages.iter().map(|p| p.chars().count()).sum::<usize>(),
        path.display()
    );

    Ok(ExtractedDocument {
        path: path.to_path_buf(),
        pages,
    })
}

/// Extract the concatenated page text of the PDF at `path`
#[inline]
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    Ok(extract_document(path)?.text())
}

/// Reads PDFs and slices their text into fixed-size overlapping windows
#[derive(Debug, Clone, Default)]
pub struct DocSplitter {
    config: ChunkingConfig,
}

impl DocSplitter {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    #[inline]
    pub fn extract_text<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        extract_text(path)
    }

    #[inline]
    pub fn split_text(&self, text: &str) -> Result<Vec<TextChunk>> {
        split_text(text, &self.config).map_err(|e| RagError::Config(e.to_string()))
    }

    /// Extract and split the PDF at `path`
    #[inline]
    pub fn split_file<P: AsRef<Path>>(&self, path: P) -> Result<SplitDocument> {
        let document = extract_document(path)?;
        let text = document.text();
        let chunks = self.split_text(&text)?;

        Ok(SplitDocument {
            char_count: text.chars().count(),
            document,
            chunks,
        })
    }
}
