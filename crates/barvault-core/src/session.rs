//! Credential keeping for the market source.
//!
//! The orchestrator polls [`SessionKeeper::expiry_notified`] between
//! instruments and calls [`SessionKeeper::renew`] when it fires. A renewal
//! failure ends the run.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::http_client::{HttpAuth, HttpClient, HttpRequest};

const LIVE_LOGIN_URL: &str = "https://login.questrade.com";
const PRACTICE_LOGIN_URL: &str = "https://practicelogin.questrade.com";
const DEFAULT_RENEWAL_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("refresh token is empty")]
    MissingRefreshToken,
    #[error("login transport error: {0}")]
    Transport(String),
    #[error("login rejected with status {status}")]
    Rejected { status: u16 },
    #[error("malformed login response: {0}")]
    MalformedResponse(String),
}

pub trait SessionKeeper: Send + Sync {
    /// True once the current credential is close enough to expiry to renew.
    fn expiry_notified(&self) -> bool;

    fn renew<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>>;
}

#[derive(Clone)]
pub struct SessionConfig {
    pub refresh_token: String,
    pub practice: bool,
    pub renewal_margin: Duration,
}

impl SessionConfig {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            practice: false,
            renewal_margin: DEFAULT_RENEWAL_MARGIN,
        }
    }

    pub fn with_practice(mut self, practice: bool) -> Self {
        self.practice = practice;
        self
    }

    pub fn with_renewal_margin(mut self, renewal_margin: Duration) -> Self {
        self.renewal_margin = renewal_margin;
        self
    }

    pub fn login_url(&self) -> &'static str {
        if self.practice {
            PRACTICE_LOGIN_URL
        } else {
            LIVE_LOGIN_URL
        }
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("practice", &self.practice)
            .field("renewal_margin", &self.renewal_margin)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
    refresh_token: String,
    api_server: String,
}

struct Credentials {
    access_token: String,
    refresh_token: String,
    api_server: String,
    expires_at: Instant,
}

/// OAuth refresh-token session against the Questrade login service.
pub struct QuestradeSession {
    http_client: Arc<dyn HttpClient>,
    login_url: &'static str,
    renewal_margin: Duration,
    credentials: RwLock<Credentials>,
}

impl QuestradeSession {
    /// Exchange the configured refresh token for a first access token.
    pub async fn login(
        http_client: Arc<dyn HttpClient>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let login_url = config.login_url();
        let credentials =
            exchange_refresh_token(http_client.as_ref(), login_url, &config.refresh_token).await?;
        info!(api_server = %credentials.api_server, practice = config.practice, "logged in");

        Ok(Self {
            http_client,
            login_url,
            renewal_margin: config.renewal_margin,
            credentials: RwLock::new(credentials),
        })
    }

    /// The rotated refresh token. Each exchange invalidates the previous one.
    pub fn refresh_token(&self) -> String {
        self.read().refresh_token.clone()
    }

    /// Base URL for API calls, always ending in `/`.
    pub fn api_server(&self) -> String {
        self.read().api_server.clone()
    }

    pub fn auth(&self) -> HttpAuth {
        HttpAuth::BearerToken(self.read().access_token.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.credentials
            .read()
            .expect("session credentials lock should not be poisoned")
    }
}

impl SessionKeeper for QuestradeSession {
    fn expiry_notified(&self) -> bool {
        let expires_at = self.read().expires_at;
        Instant::now() + self.renewal_margin >= expires_at
    }

    fn renew<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>> {
        Box::pin(async move {
            let refresh_token = self.refresh_token();
            let renewed =
                exchange_refresh_token(self.http_client.as_ref(), self.login_url, &refresh_token)
                    .await?;
            info!(api_server = %renewed.api_server, "session renewed");

            let mut credentials = self
                .credentials
                .write()
                .expect("session credentials lock should not be poisoned");
            *credentials = renewed;
            Ok(())
        })
    }
}

async fn exchange_refresh_token(
    http_client: &dyn HttpClient,
    login_url: &str,
    refresh_token: &str,
) -> Result<Credentials, SessionError> {
    if refresh_token.trim().is_empty() {
        return Err(SessionError::MissingRefreshToken);
    }

    let endpoint = format!(
        "{login_url}/oauth2/token?grant_type=refresh_token&refresh_token={}",
        urlencoding::encode(refresh_token)
    );
    let response = http_client
        .execute(HttpRequest::post(endpoint))
        .await
        .map_err(|error| SessionError::Transport(error.message().to_owned()))?;

    if !response.is_success() {
        return Err(SessionError::Rejected {
            status: response.status,
        });
    }

    let payload: TokenPayload = serde_json::from_str(&response.body)
        .map_err(|error| SessionError::MalformedResponse(error.to_string()))?;
    if payload.access_token.is_empty() || payload.refresh_token.is_empty() {
        return Err(SessionError::MalformedResponse(String::from(
            "token fields must not be empty",
        )));
    }
    debug!(
        token_type = payload.token_type.as_deref().unwrap_or("Bearer"),
        expires_in = payload.expires_in,
        "token exchanged"
    );

    let mut api_server = payload.api_server;
    if !api_server.ends_with('/') {
        api_server.push('/');
    }

    Ok(Credentials {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
        api_server,
        expires_at: Instant::now() + Duration::from_secs(payload.expires_in),
    })
}
