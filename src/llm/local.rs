use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};
use crate::error::BackendError;
use super::backend::{BackendId, CompletionOptions, ModelBackend};
use super::config::{fetch_available_models, LlmConfig};

/// Fixed generation parameters of a local quantized model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProfile {
    pub name: &'static str,
    pub subdir: &'static str,
    pub model_type: &'static str,
    pub version: &'static str,
    pub file_name: &'static str,
    pub context: u32,
    pub threads: u32,
    pub gpu_layers: u32,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub const TINYLLAMA: LocalProfile = LocalProfile {
    name: "TinyLlama",
    subdir: "tinyllama",
    model_type: "1.1b-chat",
    version: "v1.0.Q4_K_M",
    file_name: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
    context: 2048,
    threads: 4,
    gpu_layers: 20,
    max_tokens: 1024,
    temperature: 0.7,
};

pub const MISTRAL: LocalProfile = LocalProfile {
    name: "Mistral",
    subdir: "mistral",
    model_type: "7b-instruct",
    version: "v0.2.Q4_K_M",
    file_name: "mistral-7b-instruct-v0.2.Q4_K_M.gguf",
    context: 2048,
    threads: 6,
    gpu_layers: 20,
    max_tokens: 1024,
    temperature: 0.7,
};

impl LocalProfile {
    pub fn for_id(id: BackendId) -> Option<&'static LocalProfile> {
        match id {
            BackendId::LocalSmall => Some(&TINYLLAMA),
            BackendId::LocalLarge => Some(&MISTRAL),
            BackendId::Hosted => None,
        }
    }
}

/// Ordered candidate locations for a weights file under one search directory.
fn candidate_paths(dir: &Path, profile: &LocalProfile) -> Vec<PathBuf> {
    vec![
        dir.join(profile.file_name),
        dir.join(profile.subdir).join(profile.file_name),
    ]
}

/// Finds the first existing weights file for `profile`, trying each directory in order.
pub fn resolve_model_file(
    id: BackendId,
    profile: &LocalProfile,
    dirs: &[PathBuf],
) -> Result<PathBuf, BackendError> {
    let mut searched = Vec::new();

    for dir in dirs {
        for candidate in candidate_paths(dir, profile) {
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        let pattern = dir.join("**").join(profile.file_name);
        if let Ok(paths) = glob::glob(&pattern.to_string_lossy()) {
            if let Some(found) = paths.filter_map(Result::ok).find(|p| p.is_file()) {
                return Ok(found);
            }
        }
        searched.push(pattern);
    }

    Err(BackendError::ModelFileNotFound {
        identity: id.to_string(),
        searched,
    })
}

/// A quantized model served by the local OpenAI-compatible inference server.
pub struct LocalBackend {
    id: BackendId,
    profile: &'static LocalProfile,
    model_path: PathBuf,
    client: Client,
    base_url: String,
    budget: Duration,
    // the inference server holds a single generation slot
    gate: Mutex<()>,
}

impl LocalBackend {
    /// Resolves the weights file and checks that the inference server answers.
    pub async fn connect(id: BackendId, config: &LlmConfig) -> Result<Self, BackendError> {
        let profile = LocalProfile::for_id(id).ok_or_else(|| BackendError::Unavailable {
            identity: id.to_string(),
            reason: "not a local backend".to_string(),
        })?;

        let model_path = resolve_model_file(id, profile, &config.model_dirs)?;
        info!("Using model file {} for {}", model_path.display(), id);

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::Unavailable {
                identity: id.to_string(),
                reason: e.to_string(),
            })?;

        let served = fetch_available_models(&client, &config.local_url, None)
            .await
            .map_err(|e| BackendError::Unavailable {
                identity: id.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Local server at {} lists {} model(s)", config.local_url, served.len());

        Ok(Self {
            id,
            profile,
            model_path,
            client,
            base_url: config.local_url.trim_end_matches('/').to_string(),
            budget: config.timeout,
            gate: Mutex::new(()),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn profile(&self) -> &LocalProfile {
        self.profile
    }

    fn model_name(&self) -> String {
        self.model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.profile.file_name.to_string())
    }

    async fn request(&self, prompt: &str, options: &CompletionOptions) -> Result<String, BackendError> {
        let identity = self.id.to_string();

        let request_body = json!({
            "model": self.model_name(),
            "prompt": prompt,
            "max_tokens": self.profile.max_tokens,
            "temperature": self.profile.temperature,
            "stop": options.stop,
            "echo": false,
        });

        let response = self.client
            .post(format!("{}/completions", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&identity, self.budget, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable {
                identity,
                reason: format!("local server error {}: {}", status, error_text),
            });
        }

        let response_json: Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                identity: identity.clone(),
                reason: e.to_string(),
            })?;

        response_json["choices"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BackendError::InvalidResponse {
                identity,
                reason: "missing choices[0].text".to_string(),
            })
    }
}

pub(crate) fn classify_transport_error(identity: &str, budget: Duration, e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout {
            identity: identity.to_string(),
            budget,
        }
    } else {
        BackendError::Unavailable {
            identity: identity.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ModelBackend for LocalBackend {
    fn id(&self) -> BackendId {
        self.id
    }

    fn describe(&self) -> String {
        format!(
            "{}\nType: {}\nVersion: {}\nContext: {}\nThreads: {}",
            self.profile.name,
            self.profile.model_type,
            self.profile.version,
            self.profile.context,
            self.profile.threads
        )
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, BackendError> {
        let _slot = self.gate.lock().await;
        debug!("Local completion on {}: prompt_len={}", self.id, prompt.chars().count());

        match tokio::time::timeout(self.budget, self.request(prompt, options)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                identity: self.id.to_string(),
                budget: self.budget,
            }),
        }
    }
}
