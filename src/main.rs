use clap::{Parser, Subcommand};
use pdf_rag::commands::{
    ask, chat, history, index_pdf, list_llm_models, preview, search, show_status,
};
use pdf_rag::config::{run_interactive_config, show_config};
use pdf_rag::retriever::DEFAULT_QUESTION;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about PDF documents using retrieval augmented generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, Weaviate and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Extract, chunk, embed and store a PDF
    Index {
        /// Path to the PDF file
        pdf: PathBuf,
        /// Identifier stored with every chunk of this document
        #[arg(long)]
        doc_id: Option<String>,
        /// Answer a question once indexing finishes
        #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_QUESTION)]
        ask: Option<String>,
    },
    /// Answer a question from the indexed documents
    Ask {
        /// The question to answer
        #[arg(default_value = DEFAULT_QUESTION)]
        question: String,
        /// Number of chunks to retrieve (1-8)
        #[arg(long, short = 'k', value_parser = clap::value_parser!(u8).range(1..=8))]
        top_k: Option<u8>,
        /// Print the retrieved chunks after the answer
        #[arg(long)]
        show_chunks: bool,
    },
    /// Show the chunks retrieved for a question, with distances
    Search {
        /// The question to search for
        question: String,
        /// Number of chunks to retrieve (1-8)
        #[arg(long, short = 'k', value_parser = clap::value_parser!(u8).range(1..=8))]
        top_k: Option<u8>,
    },
    /// Ask questions interactively
    Chat {
        /// Number of chunks to retrieve (1-8)
        #[arg(long, short = 'k', value_parser = clap::value_parser!(u8).range(1..=8))]
        top_k: Option<u8>,
    },
    /// List indexing runs
    History {
        /// Only show runs for this document
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// List Gemini models usable for generation
    Models,
    /// Show the status of every service the pipeline depends on
    Status,
    /// Split a PDF and embed its first chunk without storing anything
    Preview {
        /// Path to the PDF file
        pdf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index { pdf, doc_id, ask } => {
            index_pdf(&pdf, doc_id.as_deref(), ask.as_deref()).await?;
        }
        Commands::Ask {
            question,
            top_k,
            show_chunks,
        } => {
            ask(&question, top_k, show_chunks)?;
        }
        Commands::Search { question, top_k } => {
            search(&question, top_k)?;
        }
        Commands::Chat { top_k } => {
            chat(top_k)?;
        }
        Commands::History { doc_id } => {
            history(doc_id.as_deref()).await?;
        }
        Commands::Models => {
            list_llm_models()?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Preview { pdf } => {
            preview(&pdf)?;
        }
    }

    Ok(())
}
