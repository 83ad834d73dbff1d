//! Error types for the TravelSafe core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Record store errors
// ---------------------------------------------------------------------------

/// Errors from reading tourist records out of the hosted record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP-level transport error (network, TLS, timeout).
    #[error("record store HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
    },

    /// The response body could not be decoded into tourist records.
    #[error("record store response parse error: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// Identity service errors
// ---------------------------------------------------------------------------

/// Errors from the identity (authentication account) service.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The email address already belongs to an account.
    #[error("{0}")]
    AlreadyRegistered(String),

    /// No account exists with the requested id or email.
    #[error("account not found: {0}")]
    NotFound(String),

    /// The service rejected the request.
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
    },

    /// HTTP-level transport error.
    #[error("identity service HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be decoded.
    #[error("identity service response parse error: {0}")]
    Parse(String),
}

impl IdentityError {
    /// Whether the failure came from the transport or decoding rather than
    /// from an answer the service gave on purpose.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Parse(_))
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

/// Batch-level provisioning failure. Only the initial record fetch can abort
/// a whole run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Fetch(#[from] StoreError),
}

/// Per-record failure, reported in that record's result and never
/// propagated past it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Account creation failed for a reason other than a duplicate email.
    #[error("{0}")]
    Create(String),

    /// The email was taken but the existing account could not be found.
    #[error("existing account lookup failed: {0}")]
    Lookup(String),

    /// The existing account was found but could not be updated.
    #[error("existing account update failed: {0}")]
    Update(String),

    /// Transport or decoding failure while handling the record.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}
