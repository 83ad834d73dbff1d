//! Identity (authentication account) service seam.
//!
//! The provisioner creates, looks up, and updates accounts through
//! [`IdentityService`]. [`AdminIdentityService`] talks to the hosted auth
//! admin API; [`InMemoryIdentityService`] is a fake for tests and dry runs.

pub mod admin;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::IdentityError;

pub use admin::AdminIdentityService;
pub use memory::InMemoryIdentityService;

/// An account as reported by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl Account {
    /// The tourist this account was provisioned for, if recorded.
    pub fn tourist_id(&self) -> Option<&str> {
        self.user_metadata.get("tourist_id").and_then(|v| v.as_str())
    }
}

/// Metadata attached to every provisioned account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountMetadata {
    pub tourist_id: String,
    pub name: String,
}

/// Request to create an account.
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: AccountMetadata,
}

/// Fields changed on an existing account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountUpdate {
    pub password: String,
    pub email_confirm: bool,
}

/// External system of record for authentication accounts.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Create an account. A taken email yields
    /// [`IdentityError::AlreadyRegistered`].
    async fn create_account(&self, account: &NewAccount) -> Result<Account, IdentityError>;

    /// Fetch an account by id. A missing account yields
    /// [`IdentityError::NotFound`].
    async fn get_account(&self, id: &str) -> Result<Account, IdentityError>;

    /// Find the account registered under `email`.
    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError>;

    async fn update_account(
        &self,
        id: &str,
        update: &AccountUpdate,
    ) -> Result<Account, IdentityError>;
}
