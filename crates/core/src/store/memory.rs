//! Fixed in-memory record store.

use async_trait::async_trait;

use super::TouristStore;
use crate::errors::StoreError;
use crate::models::TouristRecord;

/// Serves a fixed list of records, or a fixed failure.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTouristStore {
    records: Vec<TouristRecord>,
    failure: Option<String>,
}

impl InMemoryTouristStore {
    pub fn new(records: Vec<TouristRecord>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    /// A store whose every read fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl TouristStore for InMemoryTouristStore {
    async fn fetch_tourists(&self) -> Result<Vec<TouristRecord>, StoreError> {
        match &self.failure {
            Some(message) => Err(StoreError::Api {
                status: 500,
                message: message.clone(),
            }),
            None => Ok(self.records.clone()),
        }
    }
}
