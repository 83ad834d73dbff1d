//! Read access to tourist seed records.
//!
//! [`TouristStore`] is the seam the provisioner reads through:
//! [`RestTouristStore`] talks to the hosted REST API and
//! [`InMemoryTouristStore`] serves fixed records for tests and dry runs.

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::TouristRecord;

pub use memory::InMemoryTouristStore;
pub use rest::RestTouristStore;

/// Source of tourist identity seed records.
#[async_trait]
pub trait TouristStore: Send + Sync {
    /// Select `tourist_id`, `name` and `citizenship` for every tourist.
    async fn fetch_tourists(&self) -> Result<Vec<TouristRecord>, StoreError>;
}
