//! Shared HTTP plumbing for the hosted backend.
//!
//! The record store and the identity service live behind the same project
//! URL and authenticate with the same service-role key. [`BackendClient`]
//! holds the configured `reqwest::Client` both REST clients build on.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::errors::ConfigError;

/// Authenticated HTTP client for one backend project.
#[derive(Clone)]
pub struct BackendClient {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
}

impl BackendClient {
    /// Build a client from resolved backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let key = match config.service_role_key.as_deref() {
            Some(k) => k,
            None => {
                warn!(
                    env = %config.service_role_key_env,
                    "no service-role key resolved, backend requests will be unauthenticated"
                );
                ""
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("travelsafe/0.1"));
        if !key.is_empty() {
            let mut apikey = HeaderValue::from_str(key).map_err(|e| invalid_key(e.to_string()))?;
            apikey.set_sensitive(true);
            let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| invalid_key(e.to_string()))?;
            bearer.set_sensitive(true);
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "backend".into(),
                detail: format!("failed to build HTTP client: {}", e),
            })?;

        info!(base_url = %base_url, "created BackendClient");
        Ok(Self { http, base_url })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn invalid_key(detail: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: "backend.service_role_key_env".into(),
        detail: format!("service-role key is not a valid header value: {}", detail),
    }
}

/// Error body shapes returned by the hosted REST and auth APIs.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl ApiErrorBody {
    /// Parse an error body, falling back to the raw text as the message.
    pub fn parse(status: reqwest::StatusCode, body: &str) -> Self {
        let mut parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
        if parsed.message().is_none() {
            let trimmed = body.trim();
            parsed.message = Some(if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.to_string()
            });
        }
        parsed
    }

    pub fn message(&self) -> Option<&str> {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error_description.as_deref())
            .or(self.error.as_deref())
    }

    pub fn into_message(self) -> String {
        self.message().unwrap_or("unknown error").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_body_prefers_msg() {
        let body = r#"{"code":422,"error_code":"email_exists","msg":"A user with this email address has already been registered"}"#;
        let parsed = ApiErrorBody::parse(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(parsed.error_code.as_deref(), Some("email_exists"));
        assert_eq!(
            parsed.message(),
            Some("A user with this email address has already been registered")
        );
    }

    #[test]
    fn test_error_body_plain_text() {
        let parsed = ApiErrorBody::parse(StatusCode::BAD_GATEWAY, "upstream down\n");
        assert_eq!(parsed.into_message(), "upstream down");
    }

    #[test]
    fn test_error_body_empty() {
        let parsed = ApiErrorBody::parse(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(parsed.into_message(), "HTTP 503 Service Unavailable");
    }

    #[test]
    fn test_client_rejects_invalid_key() {
        let mut config = crate::config::AppConfig::for_backend("https://abc.supabase.co").backend;
        config.service_role_key = Some("bad\nkey".into());
        assert!(matches!(
            BackendClient::new(&config),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let mut config = crate::config::AppConfig::for_backend("https://abc.supabase.co/").backend;
        config.service_role_key = Some("key".into());
        let client = BackendClient::new(&config).unwrap();
        assert_eq!(client.url("/rest/v1/tourists"), "https://abc.supabase.co/rest/v1/tourists");
    }
}
