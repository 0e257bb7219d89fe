use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::sqlite::Database;
use crate::database::weaviate::{SearchResult, VectorStore};
use crate::embeddings::ollama::OllamaClient;
use crate::document::DocSplitter;
use crate::indexer::{self, Indexer};
use crate::llm::gemini::{API_KEY_ENV, GeminiClient, resolve_api_key};
use crate::retriever::{QueryAgent, Retriever};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", ":q"];

fn load_config() -> Result<Config> {
    Config::load_default().context("Failed to load configuration")
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::initialize_from_config_dir(config.get_base_dir())
        .await
        .context("Failed to initialize database")
}

/// Resolve the number of chunks to retrieve: CLI flag, else configuration
fn top_k_or_default(top_k: Option<u8>, config: &Config) -> usize {
    top_k.map_or(config.retrieval.top_k, usize::from)
}

/// Extract, chunk, embed and store a PDF, then optionally answer `ask` from the index
#[inline]
pub async fn index_pdf(path: &Path, doc_id: Option<&str>, ask: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;
    let indexer = Indexer::new(&config, database)?.with_progress(true);

    println!("Indexing {}", style(path.display()).cyan());
    let report = indexer.index_pdf(path, doc_id).await?;

    println!(
        "{} Stored {} of {} chunks as {}",
        style("✓").green(),
        report.stored,
        report.chunks,
        style(&report.doc_id).cyan()
    );
    if let Some(dimension) = report.dimension {
        println!("  Embedding dimension: {}", dimension);
    }
    if report.chunks == 0 {
        println!(
            "{}",
            style("⚠ No text could be extracted from this PDF").yellow()
        );
    }

    if let Some(question) = ask {
        let agent = QueryAgent::new(&config)?;
        println!();
        answer_question(&agent, question, config.retrieval.top_k, false)?;
    }

    Ok(())
}

/// Answer a question from the indexed documents
#[inline]
pub fn ask(question: &str, top_k: Option<u8>, show_chunks: bool) -> Result<()> {
    let config = load_config()?;
    let agent = QueryAgent::new(&config)?;
    let top_k = top_k_or_default(top_k, &config);

    answer_question(&agent, question, top_k, show_chunks)
}

/// Show the chunks retrieved for a question, without calling the LLM
#[inline]
pub fn search(question: &str, top_k: Option<u8>) -> Result<()> {
    let config = load_config()?;
    let retriever = Retriever::new(&config)?;
    let top_k = top_k_or_default(top_k, &config);

    let results = retriever.search(question, top_k)?;
    if results.is_empty() {
        println!("No chunks found. Did you index the PDF yet?");
        return Ok(());
    }

    println!("Top {} chunks:", results.len());
    println!();
    print_chunks(&results);
    Ok(())
}

/// Interactive question loop; an empty line or `exit` ends it
#[inline]
pub fn chat(top_k: Option<u8>) -> Result<()> {
    let config = load_config()?;
    let agent = QueryAgent::new(&config)?;
    let top_k = top_k_or_default(top_k, &config);

    eprintln!(
        "{}",
        style(format!("💬 Ask about your PDFs (model {})", agent.model()))
            .bold()
            .cyan()
    );
    eprintln!("Press Enter on an empty line or type 'exit' to leave.");

    loop {
        eprintln!();
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;
        let question = question.trim();

        if question.is_empty() || EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }

        // A failed question should not end the session
        if let Err(e) = answer_question(&agent, question, top_k, false) {
            warn!("Question failed: {:#}", e);
            eprintln!("{} {:#}", style("✗").red(), e);
        }
    }

    Ok(())
}

fn answer_question(agent: &QueryAgent, question: &str, top_k: usize, show_chunks: bool) -> Result<()> {
    info!("Answering question with top_k={}", top_k);
    let answer = agent.ask(question, top_k)?;

    println!("{}", style("Answer").bold().green());
    println!("{}", answer.text);

    if show_chunks && answer.has_context() {
        println!();
        println!("{}", style("Retrieved context").bold().yellow());
        print_chunks(&answer.context);
    }

    Ok(())
}

fn print_chunks(results: &[SearchResult]) {
    for (rank, result) in results.iter().enumerate() {
        let distance = result
            .distance
            .map_or_else(|| "n/a".to_string(), |d| format!("{:.4}", d));
        let source = match (&result.doc_id, result.chunk_index) {
            (Some(doc_id), Some(index)) => format!("{} #{}", doc_id, index),
            (Some(doc_id), None) => doc_id.clone(),
            _ => "unknown source".to_string(),
        };

        println!(
            "{} {} (distance {})",
            style(format!("[{}]", rank + 1)).bold(),
            style(source).cyan(),
            distance
        );
        println!("{}", result.content.trim());
        println!();
    }
}

/// List index runs recorded in the ledger
#[inline]
pub async fn history(doc_id: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let database = open_database(&config).await?;

    let runs = match doc_id {
        Some(doc_id) => database.list_runs_for_doc(doc_id).await?,
        None => database.list_runs().await?,
    };

    if runs.is_empty() {
        println!("No documents have been indexed yet.");
        println!("Use 'pdf-rag index <PDF>' to index one.");
        return Ok(());
    }

    println!("Index runs ({} total):", runs.len());
    println!();

    for run in &runs {
        println!("📄 {} (run {})", style(&run.doc_id).cyan(), run.id);
        println!("   Source: {}", run.source_path);
        println!("   Status: {}", run.status);
        println!("   Chunks: {} stored of {}", run.stored_count, run.chunk_count);
        println!(
            "   Started: {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(duration) = run.duration() {
            println!("   Duration: {}s", duration.num_seconds());
        }
        if let Some(error) = &run.error_message {
            println!("   ⚠️  Error: {}", error);
        }
        println!();
    }

    let summary = database.summary().await?;
    println!("Summary:");
    println!("  Runs: {}", summary.total_runs);
    println!("  Completed: {}", summary.completed_runs);
    println!("  Failed: {}", summary.failed_runs);
    println!("  Records stored: {}", summary.stored_records);

    Ok(())
}

/// List the Gemini models available to the configured key
#[inline]
pub fn list_llm_models() -> Result<()> {
    let config = load_config()?;
    let client = GeminiClient::new(&config)?;
    let models = client.list_models()?;

    let usable: Vec<_> = models.iter().filter(|m| m.supports_generation()).collect();
    if usable.is_empty() {
        println!("No models supporting generateContent are available to this key.");
        return Ok(());
    }

    println!("Models supporting generateContent ({}):", usable.len());
    for model in usable {
        let marker = if model.short_name() == client.model() {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        match &model.display_name {
            Some(display) => println!(" {} {} ({})", marker, model.short_name(), display),
            None => println!(" {} {}", marker, model.short_name()),
        }
    }
    println!();
    println!("Selected: {}", style(client.model()).cyan());

    Ok(())
}

/// Show detailed status of the pipeline's services
#[inline]
pub async fn show_status() -> Result<()> {
    let config = load_config()?;

    println!("📊 PDF RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Database Status:");
    match VectorStore::new(&config) {
        Ok(store) => match store.meta() {
            Ok(meta) => {
                println!(
                    "   ✅ Weaviate: Connected ({}, version {})",
                    config.weaviate.url, meta.version
                );
                match store.count() {
                    Ok(count) => println!("   📦 {} records: {}", store.class_name(), count),
                    Err(e) => println!("   ⚠️  Record count unavailable - {}", e),
                }
            }
            Err(e) => println!("   ❌ Weaviate: Failed to connect - {}", e),
        },
        Err(e) => println!("   ❌ Weaviate: Invalid configuration - {}", e),
    }
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Batch Size: {}", config.ollama.batch_size);
            }
            Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Ollama: Failed to connect - {:#}", e),
    }
    println!();

    println!("✨ LLM Status:");
    if resolve_api_key(&config.env_file_path()).is_some() {
        println!("   ✅ {}: set", API_KEY_ENV);
    } else {
        println!("   ❌ {}: missing", API_KEY_ENV);
    }
    println!(
        "   📋 Model: {}",
        config.gemini.model.as_deref().unwrap_or("(automatic)")
    );
    println!();

    println!("🗄️  Ledger Status:");
    match open_database(&config).await {
        Ok(database) => match database.summary().await {
            Ok(summary) => {
                println!("   ✅ SQLite: Connected");
                println!(
                    "   📄 Runs: {} ({} completed, {} failed)",
                    summary.total_runs, summary.completed_runs, summary.failed_runs
                );
                println!("   📦 Records stored: {}", summary.stored_records);
            }
            Err(e) => println!("   ⚠️  SQLite: Connected but unreadable - {:#}", e),
        },
        Err(e) => println!("   ❌ SQLite: Failed to connect - {:#}", e),
    }

    Ok(())
}

/// Split a PDF and embed its first chunk without storing anything
#[inline]
pub fn preview(path: &Path) -> Result<()> {
    let config = load_config()?;
    let splitter = DocSplitter::new(config.chunking)?;
    let embedder = OllamaClient::new(&config)?;

    let preview = indexer::preview(&splitter, &embedder, path)?;

    println!(
        "Extracted {} chunks from {} pages ({} characters)",
        preview.chunk_count, preview.page_count, preview.char_count
    );

    if !preview.previews.is_empty() {
        println!();
        println!("Preview of first {} chunks:", preview.previews.len());
        for (i, text) in preview.previews.iter().enumerate() {
            println!("Chunk {}: {}...", i + 1, text);
        }
    }

    if let Some(dimension) = preview.dimension {
        println!();
        println!("Sample embedding for the first chunk:");
        println!("Embedding dimension: {}", dimension);
        println!("First {} values: {:?}", preview.sample_values.len(), preview.sample_values);
    }

    Ok(())
}
