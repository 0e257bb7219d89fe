// LLM module
// Single-turn text generation against the Gemini REST API

pub mod gemini;

pub use gemini::{GeminiClient, GeminiModel};
