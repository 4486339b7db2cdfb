use std::sync::Arc;
use tracing::{error, info, warn};
use crate::error::{BackendError, EngineError};
use crate::llm::{BackendCache, BackendId, CompletionOptions, ModelBackend};
use super::intent::Intent;
use super::parser::parse_intent_response;
use super::result::{IntentResult, Outcome};
use super::sentiment::{Sentiment, SentimentClassifier};

pub const INFRASTRUCTURE_FALLBACK: &str =
    "I apologize, but I'm having trouble processing your request. Please try again.";

/// Builds the banking instruction prompt for one query.
pub fn intent_prompt(query: &str) -> String {
    format!(
        "You are a smart banking assistant. Analyze the following user query and:
1. Identify the user's intent. It must be exactly one of: {}.
2. Provide a helpful and professional banking-related response.
3. Reply with exactly one JSON object and nothing else, in this format:
{{\"intent\": \"...\", \"response\": \"...\"}}

User query: \"{}\"
",
        Intent::vocabulary(),
        query
    )
}

/// Which backend is answering, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// The requested backend is serving.
    Ready,
    /// The default backend is serving in place of the requested one.
    Degraded { requested: String, reason: String },
}

/// Turns free-text queries into validated `(intent, response)` pairs.
///
/// Bound to one backend for its whole lifetime. Queries never fail: backend
/// failures produce the `error` fallback pair, unreadable completions the
/// `unknown` one.
pub struct IntentEngine {
    backend: Arc<dyn ModelBackend>,
    sentiment: SentimentClassifier,
    state: EngineState,
}

impl IntentEngine {
    /// Binds to `requested`, falling back once to the default identity if it is
    /// unrecognized or cannot be constructed.
    pub async fn new(requested: &str, cache: &BackendCache) -> Result<Self, EngineError> {
        let default = BackendId::default();

        let (target, unrecognized) = match BackendId::parse(requested) {
            Some(id) => (id, false),
            None => {
                warn!("Unrecognized backend identity '{}', using {}", requested, default);
                (default, true)
            }
        };

        let first_error = match cache.get_or_build(target).await {
            Ok(backend) => {
                let state = if unrecognized {
                    EngineState::Degraded {
                        requested: requested.to_string(),
                        reason: "unrecognized backend identity".to_string(),
                    }
                } else {
                    EngineState::Ready
                };
                return Ok(Self::assemble(backend, state));
            }
            Err(e) => e,
        };

        if target == default {
            return Err(Self::failed(requested, &first_error, None));
        }

        error!("Backend {} failed to construct: {}. Falling back to {}", target, first_error, default);
        match cache.get_or_build(default).await {
            Ok(backend) => Ok(Self::assemble(
                backend,
                EngineState::Degraded {
                    requested: requested.to_string(),
                    reason: first_error.to_string(),
                },
            )),
            Err(default_error) => Err(Self::failed(requested, &first_error, Some(&default_error))),
        }
    }

    /// Wraps an already constructed backend.
    pub fn with_backend(backend: Arc<dyn ModelBackend>) -> Self {
        Self::assemble(backend, EngineState::Ready)
    }

    fn assemble(backend: Arc<dyn ModelBackend>, state: EngineState) -> Self {
        info!("Intent engine serving with {} ({:?})", backend.id(), state);
        Self {
            sentiment: SentimentClassifier::new(Arc::clone(&backend)),
            backend,
            state,
        }
    }

    fn failed(requested: &str, first: &BackendError, default: Option<&BackendError>) -> EngineError {
        let reason = match default {
            Some(default_error) => format!(
                "{}; default {} also failed: {}",
                first,
                BackendId::default(),
                default_error
            ),
            None => first.to_string(),
        };
        error!("Intent engine cannot start: {}", reason);
        EngineError::Failed {
            requested: requested.to_string(),
            reason,
        }
    }

    pub fn active_identity(&self) -> BackendId {
        self.backend.id()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, EngineState::Degraded { .. })
    }

    pub fn describe_backend(&self) -> String {
        self.backend.describe()
    }

    /// Answers one query with full metadata. One backend call, no retry.
    pub async fn answer(&self, query: &str) -> IntentResult {
        let model = self.backend.id();
        let prompt = intent_prompt(query);
        let options = CompletionOptions::with_stop(&["</s>"]);

        // run on its own task so a panicking backend is contained too
        let backend = Arc::clone(&self.backend);
        let call = tokio::spawn(async move { backend.complete(&prompt, &options).await });

        let raw = match call.await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("Backend {} failed to answer query: {}", model, e);
                return Self::infrastructure_fallback(model);
            }
            Err(e) => {
                error!("Backend {} task aborted: {}", model, e);
                return Self::infrastructure_fallback(model);
            }
        };

        let parsed = parse_intent_response(&raw);
        if parsed.outcome == Outcome::ContentFallback {
            warn!("Backend {} produced an uninterpretable completion", model);
        }
        IntentResult::new(parsed.intent, parsed.response, model, parsed.outcome)
    }

    pub async fn get_intent_and_response(&self, query: &str) -> (Intent, String) {
        self.answer(query).await.into_pair()
    }

    pub async fn analyze_sentiment(&self, text: &str) -> Sentiment {
        self.sentiment.classify(text).await
    }

    fn infrastructure_fallback(model: BackendId) -> IntentResult {
        IntentResult::new(
            Intent::Error,
            INFRASTRUCTURE_FALLBACK.to_string(),
            model,
            Outcome::InfrastructureFallback,
        )
    }
}
