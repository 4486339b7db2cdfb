use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use crate::error::BackendError;
use super::backend::{BackendFactory, BackendId, ModelBackend};

/// Owns constructed backends so that each identity is built at most once.
///
/// The lock is held across construction: two callers racing on the same
/// identity see one build and share the resulting instance. Failed builds
/// are not cached.
pub struct BackendCache {
    factory: Arc<dyn BackendFactory>,
    backends: Mutex<HashMap<BackendId, Arc<dyn ModelBackend>>>,
}

impl BackendCache {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            backends: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_build(&self, id: BackendId) -> Result<Arc<dyn ModelBackend>, BackendError> {
        let mut backends = self.backends.lock().await;

        if let Some(backend) = backends.get(&id) {
            debug!("Reusing cached backend {}", id);
            return Ok(Arc::clone(backend));
        }

        info!("Constructing backend {}", id);
        let backend = self.factory.build(id).await?;
        backends.insert(id, Arc::clone(&backend));
        Ok(backend)
    }

    pub async fn contains(&self, id: BackendId) -> bool {
        self.backends.lock().await.contains_key(&id)
    }

    /// Drops a cached backend; the next request for it builds a fresh one.
    pub async fn evict(&self, id: BackendId) -> bool {
        self.backends.lock().await.remove(&id).is_some()
    }

    pub async fn clear(&self) {
        self.backends.lock().await.clear();
    }
}
