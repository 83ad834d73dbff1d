//! TOML-based configuration system for TravelSafe provisioning.
//!
//! The backend service key is stored as an `_env` field that references an
//! environment variable name. The actual secret is resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Path of the liveness endpoint served next to the function.
pub const HEALTH_PATH: &str = "/health";

/// Paths the function endpoint may not be mounted on.
const RESERVED_PATHS: &[&str] = &[HEALTH_PATH];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Hosted backend (record store + identity service) settings.
    pub backend: BackendConfig,

    /// Credential derivation rules.
    #[serde(default)]
    pub credentials: CredentialPolicy,

    /// Provisioning behaviour.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:8000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Route the provisioning function is mounted on.
    #[serde(default = "default_function_path")]
    pub function_path: String,
}

fn default_listen() -> String {
    "127.0.0.1:8000".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_function_path() -> String {
    "/functions/v1/create-tourist-accounts".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            function_path: default_function_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Hosted backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL (e.g. `https://abc.supabase.co`).
    pub url: String,

    /// Environment variable holding the service-role key.
    #[serde(default = "default_service_role_key_env")]
    pub service_role_key_env: String,

    /// Table holding tourist seed records.
    #[serde(default = "default_tourists_table")]
    pub tourists_table: String,

    /// Per-request timeout for backend calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Resolved service-role key (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub service_role_key: Option<String>,
}

fn default_service_role_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".into()
}
fn default_tourists_table() -> String {
    "tourists".into()
}
fn default_request_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Rules for deriving login credentials from a tourist record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialPolicy {
    /// Domain appended to the derived email local part.
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// Literal appended to the citizenship to form the password.
    #[serde(default = "default_password_suffix")]
    pub password_suffix: String,
}

fn default_email_domain() -> String {
    "travelsafe.com".into()
}
fn default_password_suffix() -> String {
    "2024!".into()
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            email_domain: default_email_domain(),
            password_suffix: default_password_suffix(),
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

/// How an existing account is located after the identity service reports
/// that a derived email is already registered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackLookup {
    /// Fetch the account whose id equals the tourist id. Only finds the
    /// account when the two id spaces coincide.
    #[default]
    TouristId,
    /// Search the identity service for the colliding email.
    Email,
}

impl std::fmt::Display for FallbackLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TouristId => write!(f, "tourist_id"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// Provisioning behaviour configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Fallback lookup strategy for duplicate registrations.
    #[serde(default)]
    pub fallback_lookup: FallbackLookup,

    /// Return plaintext passwords in the provisioning report. Off by
    /// default; passwords are redacted otherwise.
    #[serde(default)]
    pub expose_passwords: bool,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Build a configuration for the given backend URL with every other
    /// setting at its default.
    pub fn for_backend(url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            backend: BackendConfig {
                url: url.into(),
                service_role_key_env: default_service_role_key_env(),
                tourists_table: default_tourists_table(),
                request_timeout_secs: default_request_timeout(),
                service_role_key: None,
            },
            credentials: CredentialPolicy::default(),
            provisioning: ProvisioningConfig::default(),
        }
    }

    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning but does **not** fail -- the
    /// backend clients will then be rejected by the hosted API instead.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.backend.service_role_key = resolve_optional_env(
            &self.backend.service_role_key_env,
            "backend.service_role_key_env",
        );

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend.url".into(),
                detail: "backend URL must not be empty".into(),
            });
        }
        if !self.backend.url.starts_with("http://") && !self.backend.url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "backend.url".into(),
                detail: "backend URL must start with http:// or https://".into(),
            });
        }
        if self.backend.tourists_table.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "backend.tourists_table".into(),
                detail: "table name must not be empty".into(),
            });
        }
        if self.backend.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backend.request_timeout_secs".into(),
                detail: "request timeout must be > 0".into(),
            });
        }
        if self.credentials.email_domain.is_empty() || self.credentials.email_domain.contains('@')
        {
            return Err(ConfigError::InvalidValue {
                field: "credentials.email_domain".into(),
                detail: "email domain must be non-empty and must not contain '@'".into(),
            });
        }
        if !self.server.function_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "server.function_path".into(),
                detail: "function path must start with '/'".into(),
            });
        }
        if RESERVED_PATHS.contains(&self.server.function_path.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "server.function_path".into(),
                detail: format!(
                    "function path {} is already served by the health endpoint",
                    self.server.function_path
                ),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
