use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};
use crate::error::BackendError;
use super::backend::{BackendId, CompletionOptions, ModelBackend};
use super::config::{LlmConfig, API_KEY_VAR};
use super::local::classify_transport_error;

const SYSTEM_PROMPT: &str = "You are a helpful banking assistant.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 300;

/// Remote chat-completion model. Safe to call concurrently.
pub struct HostedBackend {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    budget: Duration,
}

impl HostedBackend {
    /// Fails immediately when no API key is configured.
    pub fn new(config: &LlmConfig) -> Result<Self, BackendError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BackendError::MissingCredential {
                variable: API_KEY_VAR.to_string(),
            })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable {
                identity: BackendId::Hosted.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url: config.hosted_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.hosted_model.clone(),
            budget: config.timeout,
        })
    }

    async fn request(&self, prompt: &str, options: &CompletionOptions) -> Result<String, BackendError> {
        let identity = BackendId::Hosted.to_string();

        let mut request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        if !options.stop.is_empty() {
            request_body["stop"] = json!(options.stop);
        }

        let response = self.client
            .post(format!("{}/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&identity, self.budget, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable {
                identity,
                reason: format!("API error {}: {}", status, error_text),
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                identity: identity.clone(),
                reason: e.to_string(),
            })?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                let response_str = serde_json::to_string_pretty(&response_json)
                    .unwrap_or_else(|_| "Failed to format response".to_string());
                error!("Invalid response format. Full response: {}", response_str);
                BackendError::InvalidResponse {
                    identity: identity.clone(),
                    reason: "missing content field".to_string(),
                }
            })?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl ModelBackend for HostedBackend {
    fn id(&self) -> BackendId {
        BackendId::Hosted
    }

    fn describe(&self) -> String {
        format!("GPT\nModel: {}", self.model)
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, BackendError> {
        debug!("Hosted completion: model={} prompt_len={}", self.model, prompt.chars().count());

        match tokio::time::timeout(self.budget, self.request(prompt, options)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                identity: BackendId::Hosted.to_string(),
                budget: self.budget,
            }),
        }
    }
}
