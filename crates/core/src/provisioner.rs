//! Tourist account provisioner.
//!
//! The [`Provisioner`] reconciles derived credentials against the identity
//! service. Each run:
//!
//! 1. Fetches every tourist record from the record store (fatal on failure).
//! 2. Derives one credential per record.
//! 3. Drives each credential, one at a time and in input order, through the
//!    per-record state machine:
//!
//! ```text
//! Pending --create ok--------------------------> Created
//!    |--already registered--> DuplicateFound --> Updated
//!    |                              `----------> Failed (lookup / update)
//!    `--any other error-------------------------> Failed (create / unexpected)
//! ```
//!
//! 4. Collects one result per record plus a summary into a
//!    [`ProvisioningReport`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::config::{AppConfig, CredentialPolicy, FallbackLookup, ProvisioningConfig};
use crate::credentials;
use crate::errors::{ConfigError, IdentityError, ProvisionError, RecordError};
use crate::identity::{
    AccountMetadata, AccountUpdate, AdminIdentityService, IdentityService, NewAccount,
};
use crate::models::{Credential, ProvisionAction, ProvisioningReport, ProvisioningResult};
use crate::store::{RestTouristStore, TouristStore};

// ---------------------------------------------------------------------------
// Per-record state machine
// ---------------------------------------------------------------------------

/// Where one credential is in its reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    /// Creation was refused because the email is taken.
    DuplicateFound { reason: String },
    Created { user_id: String },
    Updated { user_id: String },
    Failed(RecordError),
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Created { .. } | Self::Updated { .. } | Self::Failed(_)
        )
    }

    /// Render a terminal state as the result reported for `credential`.
    ///
    /// A non-terminal state is reported as a failure; [`Provisioner`] never
    /// hands one over.
    pub fn into_result(self, credential: &Credential) -> ProvisioningResult {
        match self {
            Self::Created { user_id } => {
                ProvisioningResult::succeeded(credential, ProvisionAction::Created, user_id)
            }
            Self::Updated { user_id } => {
                ProvisioningResult::succeeded(credential, ProvisionAction::Updated, user_id)
            }
            Self::Failed(err) => ProvisioningResult::failed(credential, err.to_string()),
            other => ProvisioningResult::failed(
                credential,
                RecordError::Unexpected(format!("provisioning stopped in state {}", other))
                    .to_string(),
            ),
        }
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::DuplicateFound { .. } => write!(f, "duplicate_found"),
            Self::Created { .. } => write!(f, "created"),
            Self::Updated { .. } => write!(f, "updated"),
            Self::Failed(_) => write!(f, "failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioner
// ---------------------------------------------------------------------------

/// Creates or updates one identity account per tourist record.
pub struct Provisioner {
    store: Arc<dyn TouristStore>,
    identity: Arc<dyn IdentityService>,
    policy: CredentialPolicy,
    settings: ProvisioningConfig,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn TouristStore>,
        identity: Arc<dyn IdentityService>,
        settings: ProvisioningConfig,
        policy: CredentialPolicy,
    ) -> Self {
        info!(
            fallback_lookup = %settings.fallback_lookup,
            expose_passwords = settings.expose_passwords,
            "initializing provisioner"
        );
        Self {
            store,
            identity,
            policy,
            settings,
        }
    }

    /// Wire a provisioner to the hosted backend described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let client = BackendClient::new(&config.backend)?;
        let store = RestTouristStore::new(client.clone(), config.backend.tourists_table.clone());
        let identity = AdminIdentityService::new(client);
        Ok(Self::new(
            Arc::new(store),
            Arc::new(identity),
            config.provisioning.clone(),
            config.credentials.clone(),
        ))
    }

    /// Fetch every record and derive its credential without touching the
    /// identity service.
    pub async fn preview(&self) -> Result<Vec<Credential>, ProvisionError> {
        let records = self.store.fetch_tourists().await?;
        Ok(credentials::derive_all(&records, &self.policy))
    }

    /// Execute one full provisioning run.
    ///
    /// Only a failed record fetch aborts the run; every per-record failure is
    /// reported in that record's result.
    pub async fn run(&self) -> Result<ProvisioningReport, ProvisionError> {
        let records = self.store.fetch_tourists().await.map_err(|e| {
            warn!(error = %e, "failed to fetch tourist records");
            e
        })?;
        info!(count = records.len(), "starting provisioning run");

        let credentials = credentials::derive_all(&records, &self.policy);

        let mut results = Vec::with_capacity(credentials.len());
        for credential in &credentials {
            let state = self.provision_one(credential).await;
            results.push(state.into_result(credential));
        }

        let mut report = ProvisioningReport::new(results, credentials);
        if !self.settings.expose_passwords {
            report.redact_passwords();
        }

        info!(
            total = report.summary.total,
            successful = report.summary.successful,
            failed = report.summary.failed,
            "provisioning run complete"
        );
        Ok(report)
    }

    /// Drive one credential from `Pending` to a terminal state.
    pub async fn provision_one(&self, credential: &Credential) -> RecordState {
        let mut state = RecordState::Pending;
        while !state.is_terminal() {
            let next = self.step(state, credential).await;
            debug!(tourist_id = %credential.tourist_id, state = %next, "record transition");
            state = next;
        }

        match &state {
            RecordState::Failed(err) => warn!(
                tourist_id = %credential.tourist_id,
                name = %credential.name,
                error = %err,
                "failed to provision account"
            ),
            _ => info!(
                tourist_id = %credential.tourist_id,
                email = %credential.email,
                outcome = %state,
                "provisioned account"
            ),
        }
        state
    }

    /// Perform the single transition out of `state`.
    pub async fn step(&self, state: RecordState, credential: &Credential) -> RecordState {
        match state {
            RecordState::Pending => self.try_create(credential).await,
            RecordState::DuplicateFound { reason } => {
                debug!(tourist_id = %credential.tourist_id, reason = %reason, "email already registered");
                self.try_update_existing(credential).await
            }
            terminal => terminal,
        }
    }

    async fn try_create(&self, credential: &Credential) -> RecordState {
        let request = NewAccount {
            email: credential.email.clone(),
            password: credential.password.clone(),
            email_confirm: true,
            user_metadata: AccountMetadata {
                tourist_id: credential.tourist_id.clone(),
                name: credential.name.clone(),
            },
        };

        match self.identity.create_account(&request).await {
            Ok(account) => RecordState::Created {
                user_id: account.id,
            },
            Err(IdentityError::AlreadyRegistered(reason)) => RecordState::DuplicateFound { reason },
            Err(e) if e.is_unexpected() => {
                RecordState::Failed(RecordError::Unexpected(e.to_string()))
            }
            Err(e) => RecordState::Failed(RecordError::Create(e.to_string())),
        }
    }

    async fn try_update_existing(&self, credential: &Credential) -> RecordState {
        let lookup = match self.settings.fallback_lookup {
            FallbackLookup::TouristId => self.identity.get_account(&credential.tourist_id).await,
            FallbackLookup::Email => self.identity.find_account_by_email(&credential.email).await,
        };
        let existing = match lookup {
            Ok(account) => account,
            Err(e) if e.is_unexpected() => {
                return RecordState::Failed(RecordError::Unexpected(e.to_string()))
            }
            Err(e) => return RecordState::Failed(RecordError::Lookup(e.to_string())),
        };

        // An email hit may be another tourist's account when two names
        // derive the same address.
        if self.settings.fallback_lookup == FallbackLookup::Email {
            match existing.tourist_id() {
                Some(owner) if owner == credential.tourist_id => {}
                Some(owner) => {
                    return RecordState::Failed(RecordError::Lookup(format!(
                        "account {} belongs to tourist {}",
                        existing.id, owner
                    )))
                }
                None => {
                    return RecordState::Failed(RecordError::Lookup(format!(
                        "account {} is not linked to a tourist",
                        existing.id
                    )))
                }
            }
        }

        let update = AccountUpdate {
            password: credential.password.clone(),
            email_confirm: true,
        };
        match self.identity.update_account(&existing.id, &update).await {
            Ok(_) => RecordState::Updated {
                user_id: existing.id,
            },
            Err(e) if e.is_unexpected() => {
                RecordState::Failed(RecordError::Unexpected(e.to_string()))
            }
            Err(e) => RecordState::Failed(RecordError::Update(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityService;
    use crate::models::TouristRecord;
    use crate::store::InMemoryTouristStore;

    fn credential() -> Credential {
        credentials::derive(
            &TouristRecord::new("TS001", "John Smith", "American"),
            &CredentialPolicy::default(),
        )
    }

    fn provisioner(identity: Arc<InMemoryIdentityService>, lookup: FallbackLookup) -> Provisioner {
        Provisioner::new(
            Arc::new(InMemoryTouristStore::default()),
            identity,
            ProvisioningConfig {
                fallback_lookup: lookup,
                expose_passwords: true,
            },
            CredentialPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_pending_to_created() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let p = provisioner(identity.clone(), FallbackLookup::TouristId);

        let next = p.step(RecordState::Pending, &credential()).await;
        assert!(matches!(next, RecordState::Created { .. }));
        assert!(next.is_terminal());
        let stored = identity.account_by_email("john.smith@travelsafe.com").unwrap();
        assert!(stored.email_confirmed);
        assert_eq!(stored.account.user_metadata["tourist_id"], "TS001");
    }

    #[tokio::test]
    async fn test_pending_to_duplicate_found() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_account("other", "john.smith@travelsafe.com", "old");
        let p = provisioner(identity, FallbackLookup::TouristId);

        let next = p.step(RecordState::Pending, &credential()).await;
        assert!(matches!(next, RecordState::DuplicateFound { .. }));
        assert!(!next.is_terminal());
    }

    #[tokio::test]
    async fn test_pending_to_failed_create() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.fail_create_for("john.smith@travelsafe.com", "Password should be stronger");
        let p = provisioner(identity, FallbackLookup::TouristId);

        let next = p.step(RecordState::Pending, &credential()).await;
        assert_eq!(
            next,
            RecordState::Failed(RecordError::Create("Password should be stronger".into()))
        );
    }

    #[tokio::test]
    async fn test_duplicate_with_tourist_id_lookup_miss() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_account("random-uuid", "john.smith@travelsafe.com", "old");
        let p = provisioner(identity.clone(), FallbackLookup::TouristId);

        let state = p.provision_one(&credential()).await;
        assert!(matches!(state, RecordState::Failed(RecordError::Lookup(_))));
        assert_eq!(
            identity.account_by_email("john.smith@travelsafe.com").unwrap().password,
            "old"
        );
    }

    #[tokio::test]
    async fn test_duplicate_with_tourist_id_lookup_hit() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_account("TS001", "john.smith@travelsafe.com", "old");
        let p = provisioner(identity.clone(), FallbackLookup::TouristId);

        let state = p.provision_one(&credential()).await;
        assert_eq!(
            state,
            RecordState::Updated {
                user_id: "TS001".into()
            }
        );
        let stored = identity.account_by_email("john.smith@travelsafe.com").unwrap();
        assert_eq!(stored.password, "American2024!");
        assert!(stored.email_confirmed);
    }

    #[tokio::test]
    async fn test_duplicate_with_email_lookup() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_tourist_account("random-uuid", "john.smith@travelsafe.com", "old", "TS001");
        let p = provisioner(identity, FallbackLookup::Email);

        let state = p.provision_one(&credential()).await;
        assert_eq!(
            state,
            RecordState::Updated {
                user_id: "random-uuid".into()
            }
        );
    }

    #[tokio::test]
    async fn test_email_lookup_refuses_another_tourists_account() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_tourist_account("u-1", "john.smith@travelsafe.com", "old", "TS009");
        let p = provisioner(identity.clone(), FallbackLookup::Email);

        let state = p.provision_one(&credential()).await;
        assert_eq!(
            state,
            RecordState::Failed(RecordError::Lookup(
                "account u-1 belongs to tourist TS009".into()
            ))
        );
        assert_eq!(
            identity.account_by_email("john.smith@travelsafe.com").unwrap().password,
            "old"
        );
    }

    #[tokio::test]
    async fn test_email_lookup_refuses_unlinked_account() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_account("u-1", "john.smith@travelsafe.com", "old");
        let p = provisioner(identity, FallbackLookup::Email);

        let state = p.provision_one(&credential()).await;
        assert!(matches!(state, RecordState::Failed(RecordError::Lookup(_))));
    }

    #[tokio::test]
    async fn test_update_failure() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.insert_account("TS001", "john.smith@travelsafe.com", "old");
        identity.fail_update_for("TS001");
        let p = provisioner(identity, FallbackLookup::TouristId);

        let state = p.provision_one(&credential()).await;
        assert_eq!(
            state,
            RecordState::Failed(RecordError::Update("update rejected".into()))
        );
    }

    #[tokio::test]
    async fn test_terminal_states_do_not_move() {
        let p = provisioner(Arc::new(InMemoryIdentityService::new()), FallbackLookup::TouristId);
        let done = RecordState::Created {
            user_id: "u1".into(),
        };
        assert_eq!(p.step(done.clone(), &credential()).await, done);
    }

    #[test]
    fn test_into_result() {
        let cred = credential();
        let result = RecordState::Updated {
            user_id: "u9".into(),
        }
        .into_result(&cred);
        assert!(result.success);
        assert_eq!(result.action, Some(ProvisionAction::Updated));
        assert_eq!(result.user_id.as_deref(), Some("u9"));

        let result = RecordState::Failed(RecordError::Lookup("account not found: TS001".into()))
            .into_result(&cred);
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("existing account lookup failed: account not found: TS001")
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RecordState::Pending.to_string(), "pending");
        assert_eq!(
            RecordState::DuplicateFound {
                reason: "x".into()
            }
            .to_string(),
            "duplicate_found"
        );
    }
}
