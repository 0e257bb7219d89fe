
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::time::Duration;

use super::settings::MAX_TOP_K;
use super::{Config, ConfigError, OllamaConfig, WeaviateConfig};
use crate::llm::gemini::{API_KEY_ENV, resolve_api_key};

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 PDF RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance that serves the embedding model.");
    eprintln!();
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Weaviate Configuration").bold().yellow());
    eprintln!("Configure the vector database that stores document chunks.");
    eprintln!();
    configure_weaviate(&mut config.weaviate)?;

    eprintln!();
    eprintln!("{}", style("Retrieval & Generation").bold().yellow());
    eprintln!();
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_connection(&config.ollama_url()?, "api/version") {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

    if test_connection(&config.weaviate_url()?, "v1/meta") {
        eprintln!("{}", style("✓ Weaviate connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Weaviate").yellow()
        );
        eprintln!("Start Weaviate before indexing or asking questions.");
    }

    if resolve_api_key(&config.env_file_path()).is_none() {
        eprintln!(
            "{}",
            style(format!("⚠ Warning: {} is not set", API_KEY_ENV)).yellow()
        );
        eprintln!(
            "Export it or add `{}=...` to {}",
            API_KEY_ENV,
            config.env_file_path().display()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Weaviate Settings:").bold().yellow());
    eprintln!("  URL: {}", style(&config.weaviate.url).cyan());
    eprintln!("  Class: {}", style(&config.weaviate.class_name).cyan());

    eprintln!();
    eprintln!("{}", style("Gemini Settings:").bold().yellow());
    eprintln!("  API: {}", style(&config.gemini.base_url).cyan());
    eprintln!(
        "  Model: {}",
        style(config.gemini.model.as_deref().unwrap_or("(automatic)")).cyan()
    );
    let key_state = if resolve_api_key(&config.env_file_path()).is_some() {
        style("set").green()
    } else {
        style("missing").red()
    };
    eprintln!("  {}: {}", API_KEY_ENV, key_state);

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} chars, overlap {}",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );
    eprintln!("  Top-K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Default Doc ID: {}",
        style(&config.retrieval.default_doc_id).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = super::get_config_dir()?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(ollama.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_weaviate(weaviate: &mut WeaviateConfig) -> Result<()> {
    let url: String = Input::new()
        .with_prompt("Weaviate URL")
        .default(weaviate.url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            WeaviateConfig::default().set_url(input.clone())
        })
        .interact_text()?;

    let class_name: String = Input::new()
        .with_prompt("Weaviate class")
        .default(weaviate.class_name.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            WeaviateConfig::default().set_class_name(input.clone())
        })
        .interact_text()?;

    weaviate.set_url(url)?;
    weaviate.set_class_name(class_name)?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Gemini model (leave blank for automatic selection)")
        .default(config.gemini.model.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), String> {
            if (1..=MAX_TOP_K).contains(input) {
                Ok(())
            } else {
                Err(format!("Top-K must be between 1 and {}", MAX_TOP_K))
            }
        })
        .interact_text()?;

    config.gemini.set_model(Some(model));
    config.retrieval.set_top_k(top_k)?;

    Ok(())
}

fn test_connection(base_url: &url::Url, path: &str) -> bool {
    let Ok(url) = base_url.join(path) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
