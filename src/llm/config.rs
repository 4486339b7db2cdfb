use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use reqwest::Client;
use tracing::debug;
use crate::error::BackendError;

pub const DEFAULT_LOCAL_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_HOSTED_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HOSTED_MODEL: &str = "gpt-3.5-turbo";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the local OpenAI-compatible inference server
    pub local_url: String,
    pub hosted_url: String,
    pub api_key: Option<String>,
    pub hosted_model: String,
    /// Directories searched, in order, for quantized weight files
    pub model_dirs: Vec<PathBuf>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    data: Vec<Model>,
}

#[derive(Debug, Deserialize)]
struct Model {
    id: String,
    name: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            local_url: DEFAULT_LOCAL_URL.to_string(),
            hosted_url: DEFAULT_HOSTED_URL.to_string(),
            api_key: None,
            hosted_model: DEFAULT_HOSTED_MODEL.to_string(),
            model_dirs: vec![PathBuf::from("models"), PathBuf::from("core/llm")],
            timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    /// Builds the configuration from the process environment, reading a `.env`
    /// file first when one exists.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut config = Self::default();

        if let Some(url) = env_var("TELLER_LOCAL_URL") {
            config.local_url = url;
        }
        if let Some(url) = env_var("OPENAI_BASE_URL") {
            config.hosted_url = url;
        }
        config.api_key = env_var(API_KEY_VAR);
        if let Some(model) = env_var("OPENAI_MODEL") {
            config.hosted_model = model;
        }
        if let Some(paths) = std::env::var_os("TELLER_MODEL_PATH") {
            let dirs: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !dirs.is_empty() {
                config.model_dirs = dirs;
            }
        }
        if let Some(secs) = env_var("TELLER_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Lists the models served by an OpenAI-compatible endpoint.
pub async fn fetch_available_models(
    client: &Client,
    api_url: &str,
    api_key: Option<&str>,
) -> Result<Vec<String>, BackendError> {
    let unavailable = |reason: String| BackendError::Unavailable {
        identity: api_url.to_string(),
        reason,
    };

    let mut request = client.get(format!("{}/models", api_url.trim_end_matches('/')));

    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {}", key));
    }

    let response = request.send().await.map_err(|e| unavailable(e.to_string()))?;

    if !response.status().is_success() {
        return Err(unavailable(format!("failed to fetch models: {}", response.status())));
    }

    let model_response: ModelResponse = response
        .json()
        .await
        .map_err(|e| unavailable(format!("malformed model listing: {}", e)))?;

    Ok(model_response.data
        .into_iter()
        .map(|model| model.name.unwrap_or(model.id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_server() {
        let config = LlmConfig::default();
        assert_eq!(config.local_url, "http://localhost:1234/v1");
        assert_eq!(config.hosted_model, "gpt-3.5-turbo");
        assert!(config.api_key.is_none());
        assert_eq!(config.model_dirs[0], PathBuf::from("models"));
    }

    #[test]
    fn blank_api_key_is_treated_as_absent() {
        let config = LlmConfig::default().with_api_key(Some("   ".to_string()));
        assert!(config.api_key.is_none());

        let config = LlmConfig::default().with_api_key(Some("sk-test".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }
}
