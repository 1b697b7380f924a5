use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const CLIENT_ID_KEY: &str = "POLARIS_CLIENT_ID";
pub const CLIENT_SECRET_KEY: &str = "POLARIS_CLIENT_SECRET";
pub const TOKEN_URL_KEY: &str = "POLARIS_TOKEN_URL";
pub const TOKEN_SCOPE_KEY: &str = "POLARIS_TOKEN_SCOPE";

const REALM_PREFIX: &str = "POLARIS_REALM_";

/// Named configuration values, read at call time.
pub trait ConfigSource: Send + Sync {
    /// Trimmed, non-blank value for `key`.
    fn get(&self, key: &str) -> Option<String>;

    fn keys(&self) -> Vec<String>;

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().and_then(non_blank)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars().map(|(key, _)| key).collect()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned().and_then(non_blank)
    }

    fn keys(&self) -> Vec<String> {
        HashMap::keys(self).cloned().collect()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_endpoint: String,
    pub scope: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("token_endpoint", &self.token_endpoint)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Looks up client credentials for the global scope or for one realm.
///
/// Realm values live under `POLARIS_REALM_{REALM}_CLIENT_ID` and friends, where
/// `{REALM}` is upper-cased with every non-alphanumeric replaced by `_`. A
/// missing realm value falls back to the global one; a missing token URL falls
/// back to the configured default endpoint.
#[derive(Clone)]
pub struct CredentialResolver {
    source: Arc<dyn ConfigSource>,
    default_token_endpoint: Option<String>,
}

impl CredentialResolver {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self {
            source,
            default_token_endpoint: None,
        }
    }

    pub fn with_default_token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.default_token_endpoint = non_blank(endpoint.into());
        self
    }

    pub fn resolve(&self, realm: Option<&str>) -> Option<Credentials> {
        let lookup = |suffix: &str, global: &str| {
            realm
                .and_then(|r| self.source.get(&realm_key(r, suffix)))
                .or_else(|| self.source.get(global))
        };

        Some(Credentials {
            client_id: lookup("CLIENT_ID", CLIENT_ID_KEY)?,
            client_secret: lookup("CLIENT_SECRET", CLIENT_SECRET_KEY)?,
            token_endpoint: lookup("TOKEN_URL", TOKEN_URL_KEY)
                .or_else(|| self.default_token_endpoint.clone())?,
            scope: lookup("TOKEN_SCOPE", TOKEN_SCOPE_KEY),
        })
    }

    /// True when a global or any realm-scoped client id is configured.
    pub fn any_configured(&self) -> bool {
        self.source.get(CLIENT_ID_KEY).is_some()
            || self.source.keys().iter().any(|key| {
                key.starts_with(REALM_PREFIX)
                    && key.ends_with("_CLIENT_ID")
                    && self.source.get(key).is_some()
            })
    }
}

/// `POLARIS_REALM_{NORMALIZED}_{suffix}`.
pub fn realm_key(realm: &str, suffix: &str) -> String {
    let normalized: String = realm
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}_{}", REALM_PREFIX, normalized, suffix)
}
