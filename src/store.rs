use std::collections::HashMap;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::agent::{Intent, Sentiment};
use crate::error::StoreError;
use crate::llm::BackendId;

pub type QueryId = u64;

/// Analytics recorded next to each interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub sentiment: Sentiment,
    pub model: BackendId,
    pub resolution_time: Duration,
    pub follow_up_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub query: String,
    pub intent: Intent,
    pub response: String,
    pub rating: Option<u8>,
    pub timestamp: DateTime<Utc>,
    pub metadata: QueryMetadata,
}

/// Interaction log used by the session layer. The intent engine never sees it.
pub trait QueryStore {
    fn record_query(
        &mut self,
        query: &str,
        intent: Intent,
        response: &str,
        metadata: QueryMetadata,
    ) -> Result<QueryId, StoreError>;

    fn update_rating(&mut self, id: QueryId, rating: u8) -> Result<(), StoreError>;

    fn get(&self, id: QueryId) -> Option<&QueryRecord>;
}

#[derive(Debug, Default)]
pub struct MemoryQueryStore {
    records: HashMap<QueryId, QueryRecord>,
    next_id: QueryId,
}

impl MemoryQueryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl QueryStore for MemoryQueryStore {
    fn record_query(
        &mut self,
        query: &str,
        intent: Intent,
        response: &str,
        metadata: QueryMetadata,
    ) -> Result<QueryId, StoreError> {
        self.next_id += 1;
        let id = self.next_id;
        self.records.insert(id, QueryRecord {
            id,
            query: query.to_string(),
            intent,
            response: response.to_string(),
            rating: None,
            timestamp: Utc::now(),
            metadata,
        });
        debug!("Recorded query {} with intent {}", id, intent);
        Ok(id)
    }

    fn update_rating(&mut self, id: QueryId, rating: u8) -> Result<(), StoreError> {
        if !(1..=5).contains(&rating) {
            return Err(StoreError::InvalidRating(rating));
        }
        let record = self.records.get_mut(&id).ok_or(StoreError::UnknownQuery(id))?;
        record.rating = Some(rating);
        Ok(())
    }

    fn get(&self, id: QueryId) -> Option<&QueryRecord> {
        self.records.get(&id)
    }
}
