use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::llm::BackendId;
use super::intent::Intent;

/// How an answer was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Well-formed JSON with an in-vocabulary intent
    Parsed,
    /// JSON decoded, intent replaced by `general_inquiry`
    Normalized,
    /// No usable JSON; first line taken as the intent token
    LineFallback,
    /// Nothing usable in the completion
    ContentFallback,
    /// The backend call itself failed
    InfrastructureFallback,
}

impl Outcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Outcome::ContentFallback | Outcome::InfrastructureFallback)
    }

    /// How far the pair can be trusted, from 1.0 for clean JSON down to 0.0
    /// for the fixed fallback pairs.
    pub fn confidence(&self) -> f32 {
        match self {
            Outcome::Parsed => 1.0,
            Outcome::Normalized => 0.6,
            Outcome::LineFallback => 0.4,
            Outcome::ContentFallback | Outcome::InfrastructureFallback => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub model: BackendId,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub confidence: f32,
}

/// One answered query. Built once per query and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    intent: Intent,
    response: String,
    metadata: ResponseMetadata,
}

impl IntentResult {
    pub fn new(intent: Intent, response: String, model: BackendId, outcome: Outcome) -> Self {
        Self {
            intent,
            response,
            metadata: ResponseMetadata {
                model,
                timestamp: Utc::now(),
                outcome,
                confidence: outcome.confidence(),
            },
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn into_pair(self) -> (Intent, String) {
        (self.intent, self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_follows_outcome() {
        let parsed = IntentResult::new(Intent::CardIssues, "Call us.".to_string(), BackendId::LocalLarge, Outcome::Parsed);
        assert_eq!(parsed.metadata().confidence, 1.0);

        let normalized = IntentResult::new(Intent::GeneralInquiry, "Hi.".to_string(), BackendId::LocalLarge, Outcome::Normalized);
        let lines = IntentResult::new(Intent::TransferMoney, "Sure.".to_string(), BackendId::LocalLarge, Outcome::LineFallback);
        assert!(normalized.metadata().confidence < 1.0);
        assert!(lines.metadata().confidence < normalized.metadata().confidence);

        for outcome in [Outcome::ContentFallback, Outcome::InfrastructureFallback] {
            let result = IntentResult::new(Intent::Unknown, String::new(), BackendId::Hosted, outcome);
            assert!(result.metadata().outcome.is_fallback());
            assert_eq!(result.metadata().confidence, 0.0);
        }
    }
}
