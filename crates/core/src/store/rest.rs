//! Record store client for the hosted REST API.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::TouristStore;
use crate::backend::{ApiErrorBody, BackendClient};
use crate::errors::StoreError;
use crate::models::TouristRecord;

const SEED_COLUMNS: &str = "tourist_id,name,citizenship";

/// Reads tourist records through `GET /rest/v1/{table}`.
#[derive(Clone)]
pub struct RestTouristStore {
    client: BackendClient,
    table: String,
}

impl RestTouristStore {
    pub fn new(client: BackendClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }
}

#[async_trait]
impl TouristStore for RestTouristStore {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn fetch_tourists(&self) -> Result<Vec<TouristRecord>, StoreError> {
        let url = self.client.url(&format!("/rest/v1/{}", self.table));
        let resp = self
            .client
            .http
            .get(&url)
            .query(&[("select", SEED_COLUMNS)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = ApiErrorBody::parse(status, &body).into_message();
            warn!(status = %status, message = %message, "record store returned error");
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = resp.text().await?;
        let records: Vec<TouristRecord> =
            serde_json::from_str(&body).map_err(|e| StoreError::Parse(e.to_string()))?;
        debug!(count = records.len(), "fetched tourist records");
        Ok(records)
    }
}
