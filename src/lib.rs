pub mod agent;
pub mod error;
pub mod llm;
pub mod store;

pub use agent::{Intent, IntentEngine, IntentResult, Sentiment};
pub use error::{BackendError, EngineError, StoreError};
pub use llm::{BackendCache, BackendId, DefaultFactory, LlmConfig};
