//! OAuth credentials for the Gmail API.
//!
//! Three pieces of external state are involved:
//! - the OAuth client secrets downloaded from the Google Cloud console
//!   (`credentials.json`, `installed` or `web` flavour)
//! - a cached token file reused across runs (`token.json`)
//! - the user's consent, obtained once through the installed-app loopback
//!   flow with PKCE
//!
//! [`Authenticator::session`] hides all of it behind "give me a valid
//! access token".

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Read-only mailbox access is all the digest needs.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SLACK_SECS: i64 = 60;

/// How long the loopback listener waits for the browser redirect.
const CONSENT_TIMEOUT: StdDuration = StdDuration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("client secrets file has neither an `installed` nor a `web` section")]
    MissingClient,
    #[error("invalid OAuth endpoint: {0}")]
    Endpoint(String),
    #[error("authorization was denied: {0}")]
    Denied(String),
    #[error("authorization callback carried an unexpected state parameter")]
    StateMismatch,
    #[error("timed out waiting for the authorization redirect")]
    ConsentTimeout,
    #[error("token endpoint request failed: {0}")]
    TokenRequest(String),
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client registration from the provider console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: SecretsFile = serde_json::from_str(json)?;
        file.installed.or(file.web).ok_or(AuthError::MissingClient)
    }

    pub fn load(path: &Path) -> Result<Self, AuthError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn oauth_client(&self) -> Result<BasicClient, AuthError> {
        let auth_url =
            AuthUrl::new(self.auth_uri.clone()).map_err(|e| AuthError::Endpoint(e.to_string()))?;
        let token_url = TokenUrl::new(self.token_uri.clone())
            .map_err(|e| AuthError::Endpoint(e.to_string()))?;
        Ok(BasicClient::new(
            ClientId::new(self.client_id.clone()),
            self.client_secret.clone().map(ClientSecret::new),
            auth_url,
            Some(token_url),
        ))
    }
}

/// A cached session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn from_response(resp: &BasicTokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: resp.access_token().secret().to_string(),
            refresh_token: resp.refresh_token().map(|r| r.secret().to_string()),
            expires_at: resp
                .expires_in()
                .and_then(|d| Duration::from_std(d).ok())
                .map(|d| now + d),
        }
    }

    /// Tokens without an expiry are taken at face value.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => now + Duration::seconds(EXPIRY_SLACK_SECS) >= exp,
            None => false,
        }
    }
}

/// Persistence for the cached session token.
pub trait TokenStore {
    fn load(&self) -> Result<Option<StoredToken>, AuthError>;
    fn save(&self, token: &StoredToken) -> Result<(), AuthError>;
}

/// JSON token cache on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredToken>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&json) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable token cache; ignoring it");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &StoredToken) -> Result<(), AuthError> {
        fs::write(&self.path, serde_json::to_string_pretty(token)?)?;
        debug!(path = %self.path.display(), "Saved session token");
        Ok(())
    }
}

/// Produces Gmail access tokens, reusing the cache whenever possible.
#[derive(Debug)]
pub struct Authenticator<S> {
    secrets: ClientSecrets,
    store: S,
    scope: String,
}

impl<S: TokenStore> Authenticator<S> {
    pub fn new(secrets: ClientSecrets, store: S) -> Self {
        Self {
            secrets,
            store,
            scope: GMAIL_READONLY_SCOPE.to_string(),
        }
    }

    /// Return a valid access token.
    ///
    /// Order of preference: unexpired cached token, refreshed cached token,
    /// fresh interactive authorization. New tokens are written back to the
    /// store.
    #[instrument(level = "info", skip_all)]
    pub async fn session(&self) -> Result<String, AuthError> {
        if let Some(token) = self.store.load()? {
            if !token.is_expired(Utc::now()) {
                debug!("Using cached session token");
                return Ok(token.access_token);
            }
            if token.refresh_token.is_some() {
                match self.refresh(&token).await {
                    Ok(fresh) => {
                        self.store.save(&fresh)?;
                        info!("Refreshed session token");
                        return Ok(fresh.access_token);
                    }
                    Err(e) => warn!(error = %e, "Token refresh failed; re-authorizing"),
                }
            }
        }

        let token = self.authorize().await?;
        self.store.save(&token)?;
        Ok(token.access_token)
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Google usually omits the refresh token on refresh, so the old one is
    /// carried over.
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, AuthError> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::TokenRequest("no refresh token cached".to_string()))?;
        let resp = self
            .secrets
            .oauth_client()?
            .exchange_refresh_token(&RefreshToken::new(refresh_token))
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;

        let mut fresh = StoredToken::from_response(&resp, Utc::now());
        if fresh.refresh_token.is_none() {
            fresh.refresh_token = token.refresh_token.clone();
        }
        Ok(fresh)
    }

    /// Run the installed-app consent flow on a loopback port.
    ///
    /// Prints the consent URL, waits for the browser redirect and exchanges
    /// the authorization code (with its PKCE verifier) for tokens.
    #[instrument(level = "info", skip_all)]
    pub async fn authorize(&self) -> Result<StoredToken, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect = RedirectUrl::new(format!("http://127.0.0.1:{port}"))
            .map_err(|e| AuthError::Endpoint(e.to_string()))?;
        let client = self.secrets.oauth_client()?.set_redirect_uri(redirect);

        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (consent_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(self.scope.clone()))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(challenge)
            .url();

        info!(port, "Waiting for OAuth consent");
        eprintln!("Open this URL in your browser to authorize mailbox access:\n{consent_url}");

        let code = tokio::time::timeout(CONSENT_TIMEOUT, wait_for_code(&listener, csrf.secret()))
            .await
            .map_err(|_| AuthError::ConsentTimeout)??;

        let resp = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;
        info!("Authorization complete");
        Ok(StoredToken::from_response(&resp, Utc::now()))
    }
}

async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String, AuthError> {
    loop {
        let (mut socket, _) = listener.accept().await?;
        let mut buf = vec![0u8; 8192];
        let n = socket.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);
        let outcome = parse_callback(&request, expected_state);

        let reply = match &outcome {
            Ok(Some(_)) => "Authorization received. You can close this tab.",
            Ok(None) => "Waiting for authorization.",
            Err(_) => "Authorization failed. Check the terminal.",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            reply.len(),
            reply
        );
        if let Err(e) = socket.write_all(response.as_bytes()).await {
            debug!(error = %e, "Could not answer loopback request");
        }

        if let Some(code) = outcome? {
            return Ok(code);
        }
    }
}

/// Pull the authorization code out of a raw loopback HTTP request.
///
/// `Ok(None)` means the request was not the OAuth redirect (a favicon
/// probe, for instance).
fn parse_callback(request: &str, expected_state: &str) -> Result<Option<String>, AuthError> {
    let Some(target) = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return Ok(None);
    };
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{target}")) else {
        return Ok(None);
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(AuthError::Denied(value.into_owned())),
            _ => {}
        }
    }

    match code {
        Some(_) if state.as_deref() != Some(expected_state) => Err(AuthError::StateMismatch),
        other => Ok(other),
    }
}
