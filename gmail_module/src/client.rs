//! Low-level Google API transport with token refresh.
//!
//! One `GoogleConnection` per user request carries the OAuth tokens; the
//! Gmail and Calendar clients share it so a refreshed access token is
//! visible to both. Base URLs are environment-overridable so tests can
//! point the clients at a local mock server.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::GoogleApiError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com";
const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How much of an error body to keep in the error message.
const ERROR_BODY_LIMIT: usize = 500;

/// OAuth material for one user, as handed over by the caller that owns the
/// session. Refresh fields are optional; without them a 401 is terminal.
#[derive(Debug, Clone)]
pub struct GoogleAuth {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: String,
}

impl GoogleAuth {
    /// Builds auth from explicit tokens, picking up client credentials and
    /// the token endpoint from the environment.
    pub fn from_tokens(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            client_id: env_non_empty("GOOGLE_CLIENT_ID"),
            client_secret: env_non_empty("GOOGLE_CLIENT_SECRET"),
            token_url: env_non_empty("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

struct RefreshCredentials {
    refresh_token: String,
    client_id: String,
    client_secret: String,
    token_url: String,
}

/// Shared transport: http client, the rotating access token, and the
/// refresh credentials when present.
pub struct GoogleConnection {
    http: reqwest::Client,
    access_token: Mutex<String>,
    refresh: Option<RefreshCredentials>,
}

impl GoogleConnection {
    pub fn new(auth: GoogleAuth) -> Result<Arc<Self>, GoogleApiError> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let refresh = match (auth.refresh_token, auth.client_id, auth.client_secret) {
            (Some(refresh_token), Some(client_id), Some(client_secret)) => {
                Some(RefreshCredentials {
                    refresh_token,
                    client_id,
                    client_secret,
                    token_url: auth.token_url,
                })
            }
            _ => None,
        };
        Ok(Arc::new(Self {
            http,
            access_token: Mutex::new(auth.access_token),
            refresh,
        }))
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Runs one request, refreshing the access token and retrying exactly
    /// once if the first attempt came back 401.
    pub(crate) async fn execute<F>(&self, build: F) -> Result<reqwest::Response, GoogleApiError>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self.access_token.lock().await.clone();
        let response = build(&token).send().await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            if self.refresh.is_none() {
                return require_success(response).await;
            }
            debug!("google api returned 401; refreshing access token");
            let refreshed = self.refresh_access_token().await?;
            let retried = build(&refreshed).send().await?;
            return require_success(retried).await;
        }
        require_success(response).await
    }

    async fn refresh_access_token(&self) -> Result<String, GoogleApiError> {
        let refresh = self.refresh.as_ref().ok_or(GoogleApiError::TokenExpired)?;
        let params = [
            ("client_id", refresh.client_id.as_str()),
            ("client_secret", refresh.client_secret.as_str()),
            ("refresh_token", refresh.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .http
            .post(&refresh.token_url)
            .form(&params)
            .send()
            .await?;
        let response = require_success(response).await?;
        let body = response.text().await?;
        let token: RefreshResponse = serde_json::from_str(&body)?;
        let mut guard = self.access_token.lock().await;
        *guard = token.access_token.clone();
        info!("refreshed google access token");
        Ok(token.access_token)
    }
}

pub(crate) async fn require_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, GoogleApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GoogleApiError::Status {
        status: status.as_u16(),
        body: snippet(&body),
    })
}

pub(crate) fn snippet(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((index, _)) => body[..index].to_string(),
        None => body.to_string(),
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Gmail REST client for one user.
///
/// Constructed per request with that user's tokens; the long-lived piece
/// is the process-wide reqwest connection pool inside.
pub struct GmailClient {
    pub(crate) conn: Arc<GoogleConnection>,
    pub(crate) base_url: String,
}

impl GmailClient {
    pub fn new(auth: GoogleAuth) -> Result<Self, GoogleApiError> {
        Ok(Self::with_connection(GoogleConnection::new(auth)?))
    }

    pub fn with_connection(conn: Arc<GoogleConnection>) -> Self {
        let base_url = env_non_empty("GMAIL_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GMAIL_BASE_URL.to_string());
        Self {
            conn,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn connection(&self) -> Arc<GoogleConnection> {
        Arc::clone(&self.conn)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.base_url, path)
    }
}

/// Google Calendar client sharing the Gmail transport.
pub struct CalendarClient {
    pub(crate) conn: Arc<GoogleConnection>,
    pub(crate) base_url: String,
}

impl CalendarClient {
    pub fn new(auth: GoogleAuth) -> Result<Self, GoogleApiError> {
        Ok(Self::with_connection(GoogleConnection::new(auth)?))
    }

    pub fn with_connection(conn: Arc<GoogleConnection>) -> Self {
        let base_url = env_non_empty("CALENDAR_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_CALENDAR_BASE_URL.to_string());
        Self {
            conn,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/calendar/v3/{}", self.base_url, path)
    }
}
