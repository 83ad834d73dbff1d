//! Client for the hosted auth admin API (`/auth/v1/admin/users`).

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{Account, AccountUpdate, IdentityService, NewAccount};
use crate::backend::{ApiErrorBody, BackendClient};
use crate::errors::IdentityError;

const USERS_PATH: &str = "/auth/v1/admin/users";
const PAGE_SIZE: u32 = 1000;
const MAX_PAGES: u32 = 100;

/// Error codes the auth API uses for a taken email.
const DUPLICATE_CODES: &[&str] = &["email_exists", "user_already_exists"];

/// Admin API responses are either the user object itself or wrapped in
/// `{"user": ...}` depending on the server version.
#[derive(Deserialize)]
#[serde(untagged)]
enum UserEnvelope {
    Wrapped { user: Account },
    Bare(Account),
}

impl UserEnvelope {
    fn into_account(self) -> Account {
        match self {
            Self::Wrapped { user } => user,
            Self::Bare(account) => account,
        }
    }
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<Account>,
}

/// Identity service backed by the hosted auth admin API.
#[derive(Clone)]
pub struct AdminIdentityService {
    client: BackendClient,
}

impl AdminIdentityService {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// URL of a single account, with `id` escaped as one path segment.
    ///
    /// Ids that would collapse into a dot segment cannot name an account.
    fn account_url(&self, id: &str) -> Result<Url, IdentityError> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(IdentityError::NotFound(id.to_string()));
        }
        let mut url = Url::parse(&self.client.url(USERS_PATH))
            .map_err(|e| IdentityError::Parse(format!("invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| IdentityError::Parse("backend URL cannot carry a path".into()))?
            .push(id);
        Ok(url)
    }

    async fn read_account(resp: reqwest::Response) -> Result<Account, IdentityError> {
        let body = resp.text().await?;
        let envelope: UserEnvelope =
            serde_json::from_str(&body).map_err(|e| IdentityError::Parse(e.to_string()))?;
        Ok(envelope.into_account())
    }
}

/// Map a non-success response onto the identity error taxonomy.
async fn error_from_response(resp: reqwest::Response, subject: &str) -> IdentityError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    classify_error(status, &body, subject)
}

fn classify_error(status: StatusCode, body: &str, subject: &str) -> IdentityError {
    let parsed = ApiErrorBody::parse(status, body);

    if status == StatusCode::NOT_FOUND {
        return IdentityError::NotFound(subject.to_string());
    }

    let code_says_duplicate = parsed
        .error_code
        .as_deref()
        .map(|c| DUPLICATE_CODES.contains(&c))
        .unwrap_or(false);
    let message = parsed.into_message();
    let lowered = message.to_lowercase();
    let message_says_duplicate =
        lowered.contains("already been registered") || lowered.contains("already registered");

    if (status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::BAD_REQUEST)
        && (code_says_duplicate || message_says_duplicate)
    {
        return IdentityError::AlreadyRegistered(message);
    }

    IdentityError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl IdentityService for AdminIdentityService {
    #[instrument(skip(self, account), fields(email = %account.email))]
    async fn create_account(&self, account: &NewAccount) -> Result<Account, IdentityError> {
        let url = self.client.url(USERS_PATH);
        let resp = self.client.http.post(&url).json(account).send().await?;
        if !resp.status().is_success() {
            let err = error_from_response(resp, &account.email).await;
            debug!(error = %err, "create account rejected");
            return Err(err);
        }
        let created = Self::read_account(resp).await?;
        info!(user_id = %created.id, "created account");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: &str) -> Result<Account, IdentityError> {
        let url = self.account_url(id)?;
        let resp = self.client.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, id).await);
        }
        let account = Self::read_account(resp).await?;
        debug!(user_id = %account.id, "fetched account");
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn find_account_by_email(&self, email: &str) -> Result<Account, IdentityError> {
        let url = self.client.url(USERS_PATH);
        for page in 1..=MAX_PAGES {
            let resp = self
                .client
                .http
                .get(&url)
                .query(&[("page", page), ("per_page", PAGE_SIZE)])
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(error_from_response(resp, email).await);
            }
            let body = resp.text().await?;
            let listing: UserPage =
                serde_json::from_str(&body).map_err(|e| IdentityError::Parse(e.to_string()))?;
            let count = listing.users.len();

            if let Some(account) = listing
                .users
                .into_iter()
                .find(|a| a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            {
                debug!(user_id = %account.id, page, "found account by email");
                return Ok(account);
            }
            if count < PAGE_SIZE as usize {
                break;
            }
            if page == MAX_PAGES {
                warn!(email, "stopped email scan at page limit");
            }
        }
        Err(IdentityError::NotFound(email.to_string()))
    }

    #[instrument(skip(self, update))]
    async fn update_account(
        &self,
        id: &str,
        update: &AccountUpdate,
    ) -> Result<Account, IdentityError> {
        let url = self.account_url(id)?;
        let resp = self.client.http.put(url).json(update).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, id).await);
        }
        let account = Self::read_account(resp).await?;
        info!(user_id = %account.id, "updated account");
        Ok(account)
    }
}
