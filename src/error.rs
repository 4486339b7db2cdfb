use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a model backend while it is being built or invoked.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("model file for {identity} not found (searched {} location(s))", searched.len())]
    ModelFileNotFound {
        identity: String,
        searched: Vec<PathBuf>,
    },

    #[error("missing credential: {variable} is not set")]
    MissingCredential { variable: String },

    #[error("backend {identity} unavailable: {reason}")]
    Unavailable { identity: String, reason: String },

    #[error("backend {identity} timed out after {}ms", budget.as_millis())]
    Timeout { identity: String, budget: Duration },

    #[error("backend {identity} returned an invalid response: {reason}")]
    InvalidResponse { identity: String, reason: String },
}

impl BackendError {
    /// True for every failure that means the engine cannot be reached or loaded.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            BackendError::ModelFileNotFound { .. }
                | BackendError::MissingCredential { .. }
                | BackendError::Unavailable { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no backend could be constructed (requested {requested}): {reason}")]
    Failed { requested: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown query id {0}")]
    UnknownQuery(u64),

    #[error("rating {0} is out of range (expected 1-5)")]
    InvalidRating(u8),
}
