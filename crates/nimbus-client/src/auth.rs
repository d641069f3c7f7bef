//! Redirect-driven login against the Nimbus auth service.
//!
//! There is no documented token endpoint. The login URL is discovered by
//! calling the auth base URL and following redirects; the absence of any
//! redirect is itself a protocol signal (bad connector id on the first call,
//! bad credentials on the second). Tokens are cached for a fixed TTL and
//! replaced wholesale on refresh.

use crate::error::NimbusError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long an issued token is trusted before a fresh login.
pub const TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(rename = "idToken")]
    id_token: String,
    #[serde(rename = "type", default)]
    _type: String,
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    acquired_at: Instant,
}

/// An authenticated session against one backend connection.
///
/// Holds the credentials, the redirect-counting HTTP client and the cached
/// token. The cache mutex is held across a refresh so concurrent callers
/// sharing the session trigger a single login.
pub struct AuthSession {
    http: reqwest::Client,
    redirects: Arc<AtomicUsize>,
    auth_url: String,
    connector_id: String,
    username: String,
    password: String,
    cached: Mutex<Option<CachedToken>>,
}

impl AuthSession {
    /// Creates a session for the given login endpoint and credentials.
    ///
    /// `auth_url` is the discovery URL, typically `<base>/auth/login`.
    pub fn new(
        auth_url: impl Into<String>,
        connector_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, NimbusError> {
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redirects);
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else {
                    counter.fetch_add(1, Ordering::SeqCst);
                    attempt.follow()
                }
            }))
            .build()?;
        Ok(Self {
            http,
            redirects,
            auth_url: auth_url.into(),
            connector_id: connector_id.into(),
            username: username.into(),
            password: password.into(),
            cached: Mutex::new(None),
        })
    }

    /// Returns a valid bearer token, logging in only when the cache is stale.
    pub async fn bearer_token(&self) -> Result<String, NimbusError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Self::token_is_fresh(entry.acquired_at.elapsed()) {
                return Ok(entry.token.clone());
            }
            debug!("cached token expired, re-running login");
        }
        let token = self.login().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            acquired_at: Instant::now(),
        });
        Ok(token)
    }

    /// A token of this age may still be used for signing.
    pub fn token_is_fresh(age: Duration) -> bool {
        age < TOKEN_TTL
    }

    async fn login(&self) -> Result<String, NimbusError> {
        // Discovery: an unauthenticated GET that must bounce to the login
        // form. No redirect means the connector id did not resolve.
        self.redirects.store(0, Ordering::SeqCst);
        let discovery = self
            .http
            .get(&self.auth_url)
            .query(&[("connector_id", self.connector_id.as_str())])
            .send()
            .await?;
        let status = discovery.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(NimbusError::AuthDiscovery(format!(
                "{} returned {status}, possibly an incorrect connector id",
                discovery.url()
            )));
        }
        if self.redirects.load(Ordering::SeqCst) == 0 {
            return Err(NimbusError::AuthDiscovery(
                "expected at least one redirect from the auth service".to_string(),
            ));
        }
        let login_url = discovery.url().clone();

        // Credentials go to wherever discovery landed. Again the redirect is
        // the success signal; staying on the form means rejection.
        self.redirects.store(0, Ordering::SeqCst);
        let login = self
            .http
            .post(login_url)
            .form(&[
                ("login", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;
        let status = login.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(NimbusError::AuthCredential(format!(
                "{} returned {status}",
                login.url()
            )));
        }
        if self.redirects.load(Ordering::SeqCst) == 0 {
            return Err(NimbusError::AuthCredential(
                "no redirect after login, probably an incorrect username/password".to_string(),
            ));
        }

        let body = login.text().await?;
        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| NimbusError::AuthParsing(format!("not a token document: {e}")))?;
        info!(auth_url = %self.auth_url, "acquired new bearer token");
        Ok(token.id_token)
    }

    /// Seeds the cache with a token acquired now (for test setup).
    #[cfg(feature = "test-util")]
    pub async fn seed_token(&self, token: impl Into<String>) {
        let mut cached = self.cached.lock().await;
        *cached = Some(CachedToken {
            token: token.into(),
            acquired_at: Instant::now(),
        });
    }
}

/// Identity of one backend connection, used as the session cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionIdentity {
    pub host: String,
    pub username: String,
    pub connector_id: String,
}

/// Sessions hoisted out of the per-cycle scope, keyed by connection
/// identity, so reconciliation cycles sharing a backend share a token.
#[derive(Default)]
pub struct SessionCache {
    sessions: StdMutex<HashMap<ConnectionIdentity, Arc<AuthSession>>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached session for this identity, creating it on first use.
    pub fn session_for(
        &self,
        identity: ConnectionIdentity,
        auth_url: &str,
        password: &str,
    ) -> Result<Arc<AuthSession>, NimbusError> {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(session) = sessions.get(&identity) {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(AuthSession::new(
            auth_url,
            identity.connector_id.clone(),
            identity.username.clone(),
            password,
        )?);
        sessions.insert(identity, Arc::clone(&session));
        Ok(session)
    }
}
