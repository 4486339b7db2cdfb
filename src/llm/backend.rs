use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use crate::error::BackendError;
use super::config::LlmConfig;
use super::hosted::HostedBackend;
use super::local::LocalBackend;

/// Symbolic name selecting a concrete model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    LocalSmall,
    LocalLarge,
    Hosted,
}

impl BackendId {
    pub const ALL: [BackendId; 3] = [BackendId::LocalSmall, BackendId::LocalLarge, BackendId::Hosted];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::LocalSmall => "local-small",
            BackendId::LocalLarge => "local-large",
            BackendId::Hosted => "hosted",
        }
    }

    /// Strict lookup by canonical name or alias.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "local-small" | "tinyllama" => Some(BackendId::LocalSmall),
            "local-large" | "mistral" => Some(BackendId::LocalLarge),
            "hosted" | "gpt" | "openai" => Some(BackendId::Hosted),
            _ => None,
        }
    }

    /// Lenient lookup: unrecognized names resolve to the default identity.
    pub fn resolve(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("Unrecognized backend identity '{}', using {}", name, BackendId::default());
            BackendId::default()
        })
    }
}

impl Default for BackendId {
    fn default() -> Self {
        BackendId::LocalLarge
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call knobs. Generation parameters belong to the backend, not the call.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub stop: Vec<String>,
}

impl CompletionOptions {
    pub fn with_stop(stop: &[&str]) -> Self {
        Self {
            stop: stop.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A text-generation engine: prompt in, raw completion out.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn id(&self) -> BackendId;

    /// Human-readable summary of the model behind this backend.
    fn describe(&self) -> String {
        self.id().to_string()
    }

    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String, BackendError>;
}

/// Builds backends by identity. Construction is the expensive step.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn build(&self, id: BackendId) -> Result<Arc<dyn ModelBackend>, BackendError>;
}

/// Factory for the real local and hosted backends.
pub struct DefaultFactory {
    config: LlmConfig,
}

impl DefaultFactory {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BackendFactory for DefaultFactory {
    async fn build(&self, id: BackendId) -> Result<Arc<dyn ModelBackend>, BackendError> {
        match id {
            BackendId::LocalSmall | BackendId::LocalLarge => {
                let backend = LocalBackend::connect(id, &self.config).await?;
                Ok(Arc::new(backend))
            }
            BackendId::Hosted => {
                let backend = HostedBackend::new(&self.config)?;
                Ok(Arc::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_names_and_aliases() {
        assert_eq!(BackendId::parse("local-small"), Some(BackendId::LocalSmall));
        assert_eq!(BackendId::parse(" Mistral "), Some(BackendId::LocalLarge));
        assert_eq!(BackendId::parse("GPT"), Some(BackendId::Hosted));
        assert_eq!(BackendId::parse("llama-70b"), None);
    }

    #[test]
    fn unknown_names_resolve_to_default() {
        assert_eq!(BackendId::resolve("does-not-exist"), BackendId::LocalLarge);
        assert_eq!(BackendId::resolve(""), BackendId::default());
        assert_eq!(BackendId::resolve("hosted"), BackendId::Hosted);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for id in BackendId::ALL {
            assert_eq!(BackendId::parse(&id.to_string()), Some(id));
        }
    }

    #[tokio::test]
    async fn default_factory_rejects_hosted_without_key() {
        let factory = DefaultFactory::new(LlmConfig::default());
        let err = factory.build(BackendId::Hosted).await.err().unwrap();
        assert!(matches!(err, BackendError::MissingCredential { .. }));
    }
}
