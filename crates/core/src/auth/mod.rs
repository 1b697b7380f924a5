//! Authorization header providers.
//!
//! Every provider answers one question: which `Authorization` header value, if
//! any, should accompany a request for a given realm. The client-credentials
//! provider obtains and caches OAuth tokens per realm; the others are fixed.

mod cache;
mod client_credentials;
mod credentials;

use chrono::{DateTime, Utc};

pub use cache::{RealmKey, TokenCache, TokenCacheEntry, DEFAULT_REALM_CAPACITY};
pub use client_credentials::{
    ClientCredentialsProvider, DEFAULT_REALM_HEADER, DEFAULT_REFRESH_BUFFER, DEFAULT_TOKEN_TIMEOUT,
    FALLBACK_TOKEN_LIFETIME,
};
pub use credentials::{
    realm_key, ConfigSource, CredentialResolver, Credentials, EnvSource, CLIENT_ID_KEY,
    CLIENT_SECRET_KEY, TOKEN_SCOPE_KEY, TOKEN_URL_KEY,
};

use crate::error::AuthError;

pub trait AuthorizationProvider: Send + Sync {
    /// `Ok(None)` means no credentials apply; the request goes out unauthenticated.
    fn authorization_header(&self, realm: Option<&str>) -> Result<Option<String>, AuthError>;
}

/// Never authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthorization;

impl AuthorizationProvider for NoAuthorization {
    fn authorization_header(&self, _realm: Option<&str>) -> Result<Option<String>, AuthError> {
        Ok(None)
    }
}

/// A fixed bearer token, shared by every realm.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }
}

impl AuthorizationProvider for StaticTokenProvider {
    fn authorization_header(&self, _realm: Option<&str>) -> Result<Option<String>, AuthError> {
        if self.token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(bearer(&self.token)))
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
