pub mod engine;
pub mod intent;
pub mod parser;
pub mod result;
pub mod sentiment;

pub use engine::{EngineState, IntentEngine, INFRASTRUCTURE_FALLBACK};
pub use intent::Intent;
pub use parser::{parse_intent_response, ParsedResponse, CONTENT_FALLBACK};
pub use result::{IntentResult, Outcome, ResponseMetadata};
pub use sentiment::{Sentiment, SentimentClassifier};
