//! Domain model types used throughout TravelSafe provisioning.
//!
//! These types bridge the record store, the provisioner, and the web API.

use serde::{Deserialize, Serialize};

/// Placeholder written over passwords when they are not exposed.
pub const REDACTED: &str = "***REDACTED***";

/// Message carried by every completed provisioning report.
pub const COMPLETION_MESSAGE: &str = "Tourist accounts creation completed";

// ---------------------------------------------------------------------------
// Tourist Record
// ---------------------------------------------------------------------------

/// Identity seed data for one traveler, as read from the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TouristRecord {
    pub tourist_id: String,
    pub name: String,
    pub citizenship: String,
}

impl TouristRecord {
    pub fn new(
        tourist_id: impl Into<String>,
        name: impl Into<String>,
        citizenship: impl Into<String>,
    ) -> Self {
        Self {
            tourist_id: tourist_id.into(),
            name: name.into(),
            citizenship: citizenship.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Login pair derived from a [`TouristRecord`]. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    pub tourist_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// Provisioning Result
// ---------------------------------------------------------------------------

/// What a successful provisioning attempt did to the identity service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionAction {
    Created,
    Updated,
}

impl std::fmt::Display for ProvisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Outcome for one tourist record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningResult {
    pub tourist_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ProvisionAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProvisioningResult {
    /// A successful outcome for `credential`.
    pub fn succeeded(credential: &Credential, action: ProvisionAction, user_id: String) -> Self {
        Self {
            tourist_id: credential.tourist_id.clone(),
            name: credential.name.clone(),
            email: credential.email.clone(),
            password: credential.password.clone(),
            success: true,
            action: Some(action),
            user_id: Some(user_id),
            error: None,
        }
    }

    /// A failed outcome for `credential`.
    pub fn failed(credential: &Credential, error: String) -> Self {
        Self {
            tourist_id: credential.tourist_id.clone(),
            name: credential.name.clone(),
            email: credential.email.clone(),
            password: credential.password.clone(),
            success: false,
            action: None,
            user_id: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Summary & Report
// ---------------------------------------------------------------------------

/// Outcome counts for one provisioning run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl ProvisioningSummary {
    pub fn from_results(results: &[ProvisioningResult]) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
        }
    }
}

/// Response body of a completed provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub message: String,
    pub results: Vec<ProvisioningResult>,
    pub credentials: Vec<Credential>,
    pub summary: ProvisioningSummary,
}

impl ProvisioningReport {
    pub fn new(results: Vec<ProvisioningResult>, credentials: Vec<Credential>) -> Self {
        let summary = ProvisioningSummary::from_results(&results);
        Self {
            message: COMPLETION_MESSAGE.to_string(),
            results,
            credentials,
            summary,
        }
    }

    /// Overwrite every password in the report with [`REDACTED`].
    pub fn redact_passwords(&mut self) {
        for result in &mut self.results {
            result.password = REDACTED.to_string();
        }
        for credential in &mut self.credentials {
            credential.password = REDACTED.to_string();
        }
    }
}
