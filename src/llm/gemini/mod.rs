#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::{RagError, config::Config};

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Models tried in order when none is configured
pub const PREFERRED_MODELS: [&str; 5] = [
    "gemini-1.5-flash",
    "gemini-1.5-flash-latest",
    "gemini-1.5-pro",
    "gemini-1.0-pro",
    "gemini-pro",
];

pub const FALLBACK_MODEL: &str = "gemini-1.5-flash";

const GENERATE_METHOD: &str = "generateContent";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiModel {
    /// Full resource name, e.g. `models/gemini-1.5-flash`
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl GeminiModel {
    #[inline]
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_METHOD)
    }

    /// Model name without the `models/` prefix
    #[inline]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Look up the API key: process environment first, then `.env` in the working
/// directory, then the `.env` file next to the configuration.
#[inline]
pub fn resolve_api_key(env_file: &Path) -> Option<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Some(key);
        }
    }

    [Path::new(".env"), env_file]
        .into_iter()
        .find_map(read_key_from_file)
}

fn read_key_from_file(path: &Path) -> Option<String> {
    let entries = dotenvy::from_path_iter(path).ok()?;
    let key = entries
        .filter_map(std::result::Result::ok)
        .find(|(name, value)| name == API_KEY_ENV && !value.trim().is_empty())
        .map(|(_, value)| value);

    if key.is_some() {
        debug!("Read {} from {}", API_KEY_ENV, path.display());
    }
    key
}

/// Choose a model from a listing.
///
/// Walks [`PREFERRED_MODELS`] in order and returns the first listed model that
/// supports `generateContent` and whose full name contains the preference.
#[inline]
pub fn pick_model(models: &[GeminiModel]) -> String {
    let usable: Vec<&GeminiModel> = models.iter().filter(|m| m.supports_generation()).collect();

    PREFERRED_MODELS
        .iter()
        .find_map(|preferred| {
            usable
                .iter()
                .find(|m| m.name.contains(preferred))
                .map(|m| m.short_name().to_string())
        })
        .unwrap_or_else(|| FALLBACK_MODEL.to_string())
}

impl GeminiClient {
    /// Create a client using the API key from the environment or a `.env` file.
    ///
    /// A missing key is an error; when no model is configured one is picked from
    /// the models available to the key.
    #[inline]
    pub fn new(config: &Config) -> Result<Self, RagError> {
        let api_key = resolve_api_key(&config.env_file_path()).ok_or_else(|| {
            RagError::Config(format!(
                "{} not found in environment or .env (looked in the working directory and {})",
                API_KEY_ENV,
                config.env_file_path().display()
            ))
        })?;

        Self::with_api_key(config, api_key)
    }

    #[inline]
    pub fn with_api_key(config: &Config, api_key: String) -> Result<Self, RagError> {
        let base_url = config
            .gemini_url()
            .map_err(|e| RagError::Config(format!("Invalid Gemini URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.gemini.timeout_seconds)))
            .http_status_as_error(false)
            .build()
            .into();

        let mut client = Self {
            base_url,
            api_key,
            model: config
                .gemini
                .model
                .clone()
                .unwrap_or_else(|| FALLBACK_MODEL.to_string()),
            agent,
        };

        if config.gemini.model.is_none() {
            client.model = client.select_model();
        }

        info!("Using Gemini model: {}", client.model);
        Ok(client)
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// List every model available to the API key, following pagination
    #[inline]
    pub fn list_models(&self) -> Result<Vec<GeminiModel>, RagError> {
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.endpoint("models")?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }

            debug!("Listing Gemini models from {}models", self.base_url);
            let body = self.read_response("model listing", self.agent.get(url.as_str()).call())?;
            let page: ModelsResponse = serde_json::from_str(&body)
                .map_err(|e| RagError::Llm(format!("Failed to parse model listing: {}", e)))?;

            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Found {} Gemini models", models.len());
        Ok(models)
    }

    /// Pick a model available to this key, falling back when listing fails
    #[inline]
    pub fn select_model(&self) -> String {
        match self.list_models() {
            Ok(models) => pick_model(&models),
            Err(e) => {
                warn!(
                    "Listing Gemini models failed, using {}: {}",
                    FALLBACK_MODEL, e
                );
                FALLBACK_MODEL.to_string()
            }
        }
    }

    /// Send a single-turn prompt and return the text of the first candidate.
    ///
    /// Returns `Ok(None)` when the response carries no text. No retries.
    #[inline]
    pub fn generate(&self, prompt: &str) -> Result<Option<String>, RagError> {
        let url = self.endpoint(&format!("models/{}:{}", self.model, GENERATE_METHOD))?;
        let payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });

        debug!(
            "Calling {} with a {}-character prompt",
            self.model,
            prompt.chars().count()
        );

        let body = self.read_response(
            "generation",
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload.to_string()),
        )?;

        let response: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Llm(format!("Failed to parse generation response: {}", e)))?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            warn!("Gemini returned no text");
            return Ok(None);
        }

        Ok(Some(text))
    }

    /// `path` under the API base with the key as an encoded query parameter
    fn endpoint(&self, path: &str) -> Result<Url, RagError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("Failed to build Gemini URL: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    fn read_response(
        &self,
        what: &str,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> Result<String, RagError> {
        // ureq errors can echo the request URL, which carries the key
        let mut response = result.map_err(|e| {
            RagError::Network(format!(
                "Gemini {} request failed: {}",
                what,
                e.to_string().replace(&self.api_key, "***")
            ))
        })?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| RagError::Network(format!("Failed to read Gemini {} response: {}", what, e)))?;

        if !status.is_success() {
            return Err(RagError::Llm(format!(
                "Gemini {} failed with HTTP {}: {}",
                what,
                status.as_u16(),
                body.trim()
            )));
        }

        Ok(body)
    }
}
