use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use crate::llm::{CompletionOptions, ModelBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVE",
            Sentiment::Negative => "NEGATIVE",
            Sentiment::Neutral => "NEUTRAL",
        }
    }

    /// Validates a single-word label; anything else is `Neutral`.
    pub fn validate(raw: &str) -> Sentiment {
        let token = raw
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_uppercase();

        match token.as_str() {
            "POSITIVE" => Sentiment::Positive,
            "NEGATIVE" => Sentiment::Negative,
            "NEUTRAL" => Sentiment::Neutral,
            _ => {
                warn!("Invalid sentiment detected: {:?}, defaulting to NEUTRAL", raw.trim());
                Sentiment::Neutral
            }
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn sentiment_prompt(text: &str) -> String {
    format!(
        "Classify the sentiment of the following banking customer message.
Answer with exactly one word: POSITIVE, NEGATIVE, or NEUTRAL.

Message: \"{}\"

Sentiment:",
        text
    )
}

/// Labels short texts with a [`Sentiment`] using a model backend.
pub struct SentimentClassifier {
    backend: Arc<dyn ModelBackend>,
}

impl SentimentClassifier {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }

    /// Never fails: backend errors and unexpected labels give `Neutral`.
    pub async fn classify(&self, text: &str) -> Sentiment {
        let prompt = sentiment_prompt(text);
        let options = CompletionOptions::with_stop(&["</s>"]);

        let model = self.backend.id();

        // a panicking backend surfaces as a JoinError instead of unwinding here
        let backend = Arc::clone(&self.backend);
        let call = tokio::spawn(async move { backend.complete(&prompt, &options).await });

        match call.await {
            Ok(Ok(raw)) => {
                let sentiment = Sentiment::validate(&raw);
                debug!("Classified sentiment as {} via {}", sentiment, model);
                sentiment
            }
            Ok(Err(e)) => {
                error!("Sentiment analysis failed on {}: {}", model, e);
                Sentiment::Neutral
            }
            Err(e) => {
                error!("Sentiment task on {} aborted: {}", model, e);
                Sentiment::Neutral
            }
        }
    }
}
