pub mod backend;
pub mod cache;
pub mod config;
pub mod hosted;
pub mod local;

pub use backend::{BackendFactory, BackendId, CompletionOptions, DefaultFactory, ModelBackend};
pub use cache::BackendCache;
pub use config::{fetch_available_models, LlmConfig};
