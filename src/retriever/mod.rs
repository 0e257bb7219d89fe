// Retriever module
// Embeds a question, fetches the nearest chunks and asks the LLM to answer from them


use tracing::{debug, error, info};

use crate::config::Config;
use crate::database::weaviate::{SearchResult, VectorStore};
use crate::embeddings::ollama::OllamaClient;
use crate::llm::gemini::GeminiClient;
use crate::{RagError, Result};

/// Returned without calling the LLM when retrieval finds nothing
pub const NO_CONTEXT_MESSAGE: &str =
    "No context retrieved from the vector store. Did you index the PDF yet?";

/// Returned when the LLM response holds no text
pub const NO_TEXT_MESSAGE: &str = "LLM returned no text.";

/// Question asked when the user does not supply one
pub const DEFAULT_QUESTION: &str = "What is discussed in the document?";

/// Error message for a blank question
pub const EMPTY_QUESTION_MESSAGE: &str = "Type a question first.";

const CONTEXT_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Chunks the answer was grounded on, closest first
    pub context: Vec<SearchResult>,
    /// Model that produced the text; `None` when the LLM was not called
    pub model: Option<String>,
}

impl Answer {
    #[inline]
    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

/// Build the single prompt sent to the LLM
#[inline]
pub fn build_prompt(question: &str, context: &[SearchResult]) -> String {
    let chunks: Vec<&str> = context.iter().map(|r| r.content.as_str()).collect();

    format!(
        "Answer the question using ONLY this context. If the answer is not in the context, say so.\n\n\
         CONTEXT:\n{}\n\nQ: {}\nA:",
        chunks.join(CONTEXT_SEPARATOR),
        question
    )
}

/// Embeds questions and looks up the nearest stored chunks
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: OllamaClient,
    store: VectorStore,
}

impl Retriever {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::from_parts(
            OllamaClient::new(config)?,
            VectorStore::new(config)?,
        ))
    }

    #[inline]
    pub fn from_parts(embedder: OllamaClient, store: VectorStore) -> Self {
        Self { embedder, store }
    }

    /// Retrieve the `top_k` stored chunks closest to `question`
    #[inline]
    pub fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if question.trim().is_empty() {
            return Err(RagError::Input(EMPTY_QUESTION_MESSAGE.to_string()));
        }

        debug!("Searching for context: query='{}', top_k={}", question, top_k);

        let query_embedding = self
            .embedder
            .generate_embedding(question)
            .map_err(|e| {
                error!("Failed to generate embedding for query: {:#}", e);
                RagError::Embedding(format!("Failed to embed question: {:#}", e))
            })?
            .embedding;

        let results = self.store.search(&query_embedding, top_k)?;
        info!("Retrieved {} chunks for question", results.len());
        Ok(results)
    }
}

/// Answers questions from retrieved context with a single LLM call
#[derive(Debug, Clone)]
pub struct QueryAgent {
    retriever: Retriever,
    llm: GeminiClient,
}

impl QueryAgent {
    /// Build the agent from configuration; fails when the API key is missing
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::from_parts(
            Retriever::new(config)?,
            GeminiClient::new(config)?,
        ))
    }

    #[inline]
    pub fn from_parts(retriever: Retriever, llm: GeminiClient) -> Self {
        Self { retriever, llm }
    }

    #[inline]
    pub fn model(&self) -> &str {
        self.llm.model()
    }

    #[inline]
    pub fn search(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.retriever.search(question, top_k)
    }

    /// Answer `question` from the `top_k` closest chunks.
    ///
    /// The LLM is called at most once, and not at all when nothing was retrieved.
    /// A blank question fails before any request is made.
    #[inline]
    pub fn ask(&self, question: &str, top_k: usize) -> Result<Answer> {
        let context = self.retriever.search(question, top_k)?;

        if context.is_empty() {
            return Ok(Answer {
                text: NO_CONTEXT_MESSAGE.to_string(),
                context,
                model: None,
            });
        }

        let prompt = build_prompt(question, &context);
        let text = self
            .llm
            .generate(&prompt)?
            .unwrap_or_else(|| NO_TEXT_MESSAGE.to_string());

        Ok(Answer {
            text,
            context,
            model: Some(self.llm.model().to_string()),
        })
    }
}
