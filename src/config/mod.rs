// Configuration management module
// TOML settings for the embedding service, vector store, LLM and chunking

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, GeminiConfig, OllamaConfig, RetrievalConfig, WeaviateConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
