//! In-memory identity service.
//!
//! Thread-safe: accounts live behind an `RwLock` so the same instance can be
//! shared between a provisioner and the test asserting on it.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use super::{Account, AccountUpdate, IdentityService, NewAccount};
use crate::errors::IdentityError;

/// How the fake assigns ids to new accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdScheme {
    Random,
    Metadata,
}

/// Stored state for one account.
#[derive(Debug, Clone)]
pub struct StoredAccount {
    pub account: Account,
    pub password: String,
    pub email_confirmed: bool,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, StoredAccount>,
    /// Insertion order of account ids, for deterministic listing.
    order: Vec<String>,
    create_failures: HashMap<String, String>,
    garbled_creates: HashSet<String>,
    update_failures: HashSet<String>,
}

/// Identity service that keeps accounts in process memory.
pub struct InMemoryIdentityService {
    inner: RwLock<Inner>,
    ids: IdScheme,
}

impl Default for InMemoryIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityService {
    /// New accounts get random UUID ids.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ids: IdScheme::Random,
        }
    }

    /// New accounts take their id from the `tourist_id` in their metadata,
    /// so account ids and tourist ids coincide.
    pub fn with_metadata_ids() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ids: IdScheme::Metadata,
        }
    }

    /// Make every create for `email` fail with a non-duplicate error.
    pub fn fail_create_for(&self, email: impl Into<String>, message: impl Into<String>) {
        self.write()
            .create_failures
            .insert(email.into(), message.into());
    }

    /// Make every create for `email` fail as if the response body were
    /// unreadable.
    pub fn fail_create_unexpectedly_for(&self, email: impl Into<String>) {
        self.write().garbled_creates.insert(email.into());
    }

    /// Make every update of account `id` fail.
    pub fn fail_update_for(&self, id: impl Into<String>) {
        self.write().update_failures.insert(id.into());
    }

    /// Insert an existing account directly, without metadata.
    pub fn insert_account(&self, id: &str, email: &str, password: &str) {
        self.insert_stored(id, email, password, serde_json::Value::Null);
    }

    /// Insert an existing account linked to `tourist_id`.
    pub fn insert_tourist_account(&self, id: &str, email: &str, password: &str, tourist_id: &str) {
        self.insert_stored(
            id,
            email,
            password,
            serde_json::json!({ "tourist_id": tourist_id }),
        );
    }

    fn insert_stored(&self, id: &str, email: &str, password: &str, metadata: serde_json::Value) {
        let mut inner = self.write();
        inner.order.push(id.to_string());
        inner.accounts.insert(
            id.to_string(),
            StoredAccount {
                account: Account {
                    id: id.to_string(),
                    email: Some(email.to_string()),
                    user_metadata: metadata,
                },
                password: password.to_string(),
                email_confirmed: false,
            },
        );
    }

    /// Snapshot of every account in creation order.
    pub fn accounts(&self) -> Vec<StoredAccount> {
        let inner = self.read();
        let accounts = inner
            .order
            .iter()
            .filter_map(|id| inner.accounts.get(id).cloned())
            .collect();
        accounts
    }

    /// Stored state for the account registered under `email`.
    pub fn account_by_email(&self, email: &str) -> Option<StoredAccount> {
        self.read()
            .accounts
            .values()
            .find(|s| s.account.email.as_deref() == Some(email))
            .cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn create_account(&self, new: &NewAccount) -> Result<Account, IdentityError> {
        let mut inner = self.write();

        if inner.garbled_creates.contains(&new.email) {
            return Err(IdentityError::Parse(
                "expected value at line 1 column 1".into(),
            ));
        }
        if let Some(message) = inner.create_failures.get(&new.email) {
            return Err(IdentityError::Api {
                status: 400,
                message: message.clone(),
            });
        }
        if inner
            .accounts
            .values()
            .any(|s| s.account.email.as_deref() == Some(new.email.as_str()))
        {
            return Err(IdentityError::AlreadyRegistered(
                "A user with this email address has already been registered".into(),
            ));
        }

        let id = match self.ids {
            IdScheme::Random => uuid::Uuid::new_v4().to_string(),
            IdScheme::Metadata => new.user_metadata.tourist_id.clone(),
        };
        if inner.accounts.contains_key(&id) {
            return Err(IdentityError::Api {
                status: 422,
                message: format!("account id {} is already in use", id),
            });
        }

        let account = Account {
            id: id.clone(),
            email: Some(new.email.clone()),
            user_metadata: serde_json::to_value(&new.user_metadata)
                .map_err(|e| IdentityError::Parse(e.to_string()))?,
        };
        inner.order.push(id.clone());
        inner.accounts.insert(
            id,
            StoredAccount {
                account: account.clone(),
                password: new.password.clone(),
                email_confirmed: new.email_confirm,
            },
        );
        debug!(user_id = %account.id, "created in-memory account");
        Ok(account)
    }

    async fn get_account(&self, id: &str) -> Result<Account, IdentityError> {
        self.read()
            .accounts
            .get(id)
            .map(|s| s.account.clone())
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        self.account_by_email(email)
            .map(|s| s.account)
            .ok_or_else(|| IdentityError::NotFound(email.to_string()))
    }

    async fn update_account(
        &self,
        id: &str,
        update: &AccountUpdate,
    ) -> Result<Account, IdentityError> {
        let mut inner = self.write();
        if inner.update_failures.contains(id) {
            return Err(IdentityError::Api {
                status: 500,
                message: "update rejected".into(),
            });
        }
        let stored = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))?;
        stored.password = update.password.clone();
        stored.email_confirmed = update.email_confirm;
        Ok(stored.account.clone())
    }
}
