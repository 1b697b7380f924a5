use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cache::{lock, RealmKey, TokenCache, TokenCacheEntry};
use super::credentials::{CredentialResolver, Credentials};
use super::{bearer, AuthorizationProvider, Clock, SystemClock};
use crate::error::AuthError;
use crate::http::{HttpClient, HttpRequest, Method};

pub const DEFAULT_REALM_HEADER: &str = "Polaris-Realm";
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::from_secs(60);
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);
/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const FALLBACK_TOKEN_LIFETIME: Duration = Duration::from_secs(300);

/// OAuth2 client-credentials flow with a per-realm token cache.
///
/// Credentials are resolved on every call, so realms configured after startup
/// are picked up. A realm's slot stays locked across the freshness check and
/// the fetch: concurrent callers for one realm share a single fetch, while
/// other realms proceed independently. A failed fetch leaves the slot as it was.
/// Realm names come from callers, so the cache holds at most a bounded number
/// of realms; see [`TokenCache`].
pub struct ClientCredentialsProvider {
    http: Arc<dyn HttpClient>,
    credentials: CredentialResolver,
    realm_header: String,
    refresh_buffer: TimeDelta,
    fallback_lifetime: TimeDelta,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    cache: TokenCache,
}

impl ClientCredentialsProvider {
    pub fn new(http: Arc<dyn HttpClient>, credentials: CredentialResolver) -> Self {
        Self {
            http,
            credentials,
            realm_header: DEFAULT_REALM_HEADER.to_string(),
            refresh_buffer: to_delta(DEFAULT_REFRESH_BUFFER),
            fallback_lifetime: to_delta(FALLBACK_TOKEN_LIFETIME),
            timeout: DEFAULT_TOKEN_TIMEOUT,
            clock: Arc::new(SystemClock),
            cache: TokenCache::new(),
        }
    }

    pub fn with_refresh_buffer(mut self, refresh_buffer: Duration) -> Self {
        self.refresh_buffer = to_delta(refresh_buffer);
        self
    }

    pub fn with_fallback_lifetime(mut self, lifetime: Duration) -> Self {
        self.fallback_lifetime = to_delta(lifetime);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_realm_header(mut self, header: impl Into<String>) -> Self {
        self.realm_header = header.into();
        self
    }

    /// Upper bound on realms with a cached token (default
    /// [`DEFAULT_REALM_CAPACITY`](super::cache::DEFAULT_REALM_CAPACITY)).
    pub fn with_realm_capacity(mut self, capacity: usize) -> Self {
        self.cache = TokenCache::with_capacity(capacity);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    fn fetch_token(
        &self,
        credentials: &Credentials,
        realm: Option<&str>,
    ) -> Result<TokenCacheEntry, AuthError> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        if let Some(scope) = &credentials.scope {
            form.push(("scope", scope.as_str()));
        }
        let body = form
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut headers = BTreeMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(realm) = realm {
            headers.insert(self.realm_header.clone(), realm.to_string());
        }

        let request = HttpRequest {
            method: Method::Post,
            url: credentials.token_endpoint.clone(),
            headers,
            body: Some(body.into_bytes()),
            timeout: self.timeout,
        };

        debug!(endpoint = %request.url, realm = realm.unwrap_or("<global>"), "requesting access token");
        let response = self.http.request(&request)?;

        if response.status != 200 {
            warn!(status = response.status, realm = realm.unwrap_or("<global>"), "token request rejected");
            return Err(AuthError::Status {
                status: response.status,
                body: String::from_utf8_lossy(&response.data).into_owned(),
            });
        }

        let payload: Value = serde_json::from_slice(&response.data)
            .map_err(|e| AuthError::InvalidJson(e.to_string()))?;

        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingAccessToken)?
            .to_string();

        let lifetime = payload
            .get("expires_in")
            .and_then(expires_in_seconds)
            .map(|secs| TimeDelta::milliseconds((secs.max(0.0) * 1000.0) as i64))
            .unwrap_or(self.fallback_lifetime);

        let expires_at = self
            .clock
            .now()
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        info!(
            realm = realm.unwrap_or("<global>"),
            expires_in_secs = lifetime.num_seconds(),
            "obtained access token"
        );

        Ok(TokenCacheEntry {
            access_token,
            expires_at,
        })
    }
}

impl AuthorizationProvider for ClientCredentialsProvider {
    fn authorization_header(&self, realm: Option<&str>) -> Result<Option<String>, AuthError> {
        let realm = realm.filter(|r| !r.trim().is_empty());

        let Some(credentials) = self.credentials.resolve(realm) else {
            debug!(realm = realm.unwrap_or("<global>"), "no client credentials configured");
            return Ok(None);
        };

        let key = RealmKey::from(realm);
        let slot = self.cache.slot(&key, self.clock.now());
        let mut entry = lock(&slot);

        if let Some(cached) = entry
            .as_ref()
            .filter(|cached| cached.is_fresh(self.clock.now(), self.refresh_buffer))
        {
            debug!(realm = %key, "using cached access token");
            return Ok(Some(bearer(&cached.access_token)));
        }

        let fetched = self.fetch_token(&credentials, realm)?;
        let header = bearer(&fetched.access_token);
        *entry = Some(fetched);
        Ok(Some(header))
    }
}

fn expires_in_seconds(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::cache::DEFAULT_REALM_CAPACITY;
    use crate::auth::credentials::{
        ConfigSource, CLIENT_ID_KEY, CLIENT_SECRET_KEY, TOKEN_SCOPE_KEY, TOKEN_URL_KEY,
    };
    use crate::error::HttpError;
    use crate::http::HttpResponse;
    use crate::testutils::{token_response, ManualClock, ScriptedHttp};
    use std::collections::HashMap;
    use std::sync::mpsc;
    use std::thread;

    fn config(pairs: &[(&str, &str)]) -> Arc<dyn ConfigSource> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn global_config() -> Arc<dyn ConfigSource> {
        config(&[
            (CLIENT_ID_KEY, "client"),
            (CLIENT_SECRET_KEY, "secret"),
            (TOKEN_URL_KEY, "https://auth/token"),
        ])
    }

    fn provider(
        http: Arc<ScriptedHttp>,
        source: Arc<dyn ConfigSource>,
        clock: Arc<ManualClock>,
        buffer_secs: u64,
    ) -> ClientCredentialsProvider {
        ClientCredentialsProvider::new(http, CredentialResolver::new(source))
            .with_refresh_buffer(Duration::from_secs(buffer_secs))
            .with_clock(clock)
    }

    fn form_body(request: &HttpRequest) -> String {
        String::from_utf8(request.body.clone().unwrap_or_default()).unwrap()
    }

    #[test]
    fn fetches_once_then_serves_from_cache() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("abc", Some(120)));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 0);

        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(http.request_count(), 1);

        let request = &http.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "https://auth/token");
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        let body = form_body(request);
        assert!(body.contains("grant_type=client_credentials"));
        assert!(body.contains("client_id=client"));
        assert!(body.contains("client_secret=secret"));
        assert!(!body.contains("scope="));
        assert!(!request.headers.contains_key(DEFAULT_REALM_HEADER));
    }

    #[test]
    fn refreshes_after_refresh_buffer_boundary() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("abc", Some(120)));
        http.push(token_response("def", Some(120)));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 30);

        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer abc")
        );

        clock.advance_secs(89);
        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer abc")
        );
        assert_eq!(http.request_count(), 1);

        clock.advance_secs(2);
        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer def")
        );
        assert_eq!(http.request_count(), 2);
    }

    #[test]
    fn refreshes_exactly_at_boundary_and_keeps_new_token() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("initial", Some(120)));
        http.push(token_response("refreshed", Some(120)));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 30);

        provider.authorization_header(None).unwrap();
        clock.advance_secs(90);
        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer refreshed")
        );
        clock.advance_secs(31);
        assert_eq!(
            provider.authorization_header(None).unwrap().as_deref(),
            Some("Bearer refreshed")
        );
        assert_eq!(http.request_count(), 2);
    }

    #[test]
    fn missing_expires_in_uses_fallback_lifetime() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("abc", None));
        let clock = Arc::new(ManualClock::new());
        let start = clock.now();
        let provider = provider(http.clone(), global_config(), clock.clone(), 0);

        provider.authorization_header(None).unwrap();
        let entry = provider.cache().get(&RealmKey::Global).unwrap();
        assert_eq!(
            entry.expires_at,
            start + to_delta(FALLBACK_TOKEN_LIFETIME)
        );
    }

    #[test]
    fn sends_scope_and_realm_header() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("west-token", Some(3600)));
        let source = config(&[
            (CLIENT_ID_KEY, "client"),
            (CLIENT_SECRET_KEY, "secret"),
            (TOKEN_URL_KEY, "https://auth/token"),
            (TOKEN_SCOPE_KEY, "PRINCIPAL_ROLE:ALL"),
        ]);
        let provider = ClientCredentialsProvider::new(http.clone(), CredentialResolver::new(source))
            .with_realm_header("X-Realm");

        assert_eq!(
            provider.authorization_header(Some("west")).unwrap().as_deref(),
            Some("Bearer west-token")
        );
        let request = &http.requests()[0];
        assert_eq!(request.headers.get("X-Realm").map(String::as_str), Some("west"));
        assert!(form_body(request).contains("scope=PRINCIPAL_ROLE%3AALL"));
    }

    #[test]
    fn realms_and_global_cache_independently() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("global", Some(120)));
        http.push(token_response("west", Some(120)));
        http.push(token_response("east", Some(600)));
        http.push(token_response("west-2", Some(120)));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 0);

        assert_eq!(provider.authorization_header(None).unwrap().as_deref(), Some("Bearer global"));
        assert_eq!(provider.authorization_header(Some("west")).unwrap().as_deref(), Some("Bearer west"));
        assert_eq!(provider.authorization_header(Some("east")).unwrap().as_deref(), Some("Bearer east"));
        assert_eq!(http.request_count(), 3);

        // Global token must not be served for the realm, nor the other way round.
        assert_eq!(provider.authorization_header(None).unwrap().as_deref(), Some("Bearer global"));
        assert_eq!(provider.authorization_header(Some("west")).unwrap().as_deref(), Some("Bearer west"));
        assert_eq!(http.request_count(), 3);

        // Expire global and west; east has a longer lifetime and stays cached.
        clock.advance_secs(200);
        assert_eq!(provider.authorization_header(Some("east")).unwrap().as_deref(), Some("Bearer east"));
        assert_eq!(http.request_count(), 3);
        assert_eq!(provider.authorization_header(Some("west")).unwrap().as_deref(), Some("Bearer west-2"));
        assert_eq!(http.request_count(), 4);
        assert_eq!(
            provider.cache().get(&RealmKey::Global).unwrap().access_token,
            "global"
        );
    }

    #[test]
    fn arbitrary_realm_names_do_not_grow_the_cache_unbounded() {
        let http = Arc::new(ScriptedHttp::new());
        for i in 0..50 {
            http.push(token_response(&format!("tok-{i}"), Some(300)));
        }
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 0).with_realm_capacity(8);

        for i in 0..50 {
            let realm = format!("realm-{i}");
            assert_eq!(
                provider.authorization_header(Some(&realm)).unwrap(),
                Some(format!("Bearer tok-{i}"))
            );
            assert!(provider.cache().slot_count() <= 8);
        }
        assert_eq!(http.request_count(), 50);
        // The latest realm is still served from cache.
        assert_eq!(
            provider.authorization_header(Some("realm-49")).unwrap().as_deref(),
            Some("Bearer tok-49")
        );
        assert_eq!(http.request_count(), 50);
    }

    #[test]
    fn expired_realms_are_dropped_when_a_new_realm_arrives() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("west", Some(60)));
        http.push(token_response("east", Some(60)));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 0);

        provider.authorization_header(Some("west")).unwrap();
        clock.advance_secs(120);
        provider.authorization_header(Some("east")).unwrap();

        assert!(provider.cache().get(&RealmKey::Realm("west".to_string())).is_none());
        assert_eq!(provider.cache().slot_count(), 1);
        assert_eq!(provider.cache().capacity(), DEFAULT_REALM_CAPACITY);
    }

    #[test]
    fn incomplete_realm_credentials_never_call_http() {
        let http = Arc::new(ScriptedHttp::new());
        let source = config(&[
            ("POLARIS_REALM_EAST_CLIENT_ID", "east"),
            (TOKEN_URL_KEY, "https://auth/token"),
        ]);
        let provider = ClientCredentialsProvider::new(http.clone(), CredentialResolver::new(source));

        assert_eq!(provider.authorization_header(Some("east")).unwrap(), None);
        assert_eq!(provider.authorization_header(None).unwrap(), None);
        assert_eq!(http.request_count(), 0);
    }

    #[test]
    fn credentials_are_read_at_call_time() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("late", Some(120)));
        let source = Arc::new(crate::testutils::MutableSource::new());
        let provider =
            ClientCredentialsProvider::new(http.clone(), CredentialResolver::new(source.clone()));

        assert_eq!(provider.authorization_header(Some("late")).unwrap(), None);

        source.set("POLARIS_REALM_LATE_CLIENT_ID", "c");
        source.set("POLARIS_REALM_LATE_CLIENT_SECRET", "s");
        source.set("POLARIS_REALM_LATE_TOKEN_URL", "https://auth/late");
        assert_eq!(
            provider.authorization_header(Some("late")).unwrap().as_deref(),
            Some("Bearer late")
        );
        assert_eq!(http.requests()[0].url, "https://auth/late");
    }

    #[test]
    fn rejects_invalid_token_responses() {
        let cases = [
            (r#"{"access_token": ""}"#, "missing access_token"),
            (r#"{"nope": "value"}"#, "missing access_token"),
            ("not-json", "invalid JSON"),
        ];
        for (payload, expected) in cases {
            let http = Arc::new(ScriptedHttp::new());
            http.push(Ok(HttpResponse::new(200, payload)));
            let provider = provider(http, global_config(), Arc::new(ManualClock::new()), 0);

            let err = provider.authorization_header(None).unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{} should mention {}",
                err,
                expected
            );
        }
    }

    #[test]
    fn non_200_status_is_an_error() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(Ok(HttpResponse::new(500, "boom")));
        let provider = provider(http, global_config(), Arc::new(ManualClock::new()), 0);

        let err = provider.authorization_header(None).unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(provider.cache().is_empty());
    }

    #[test]
    fn failed_refresh_keeps_previous_entry() {
        let http = Arc::new(ScriptedHttp::new());
        http.push(token_response("abc", Some(120)));
        http.push(Err(HttpError::Timeout("token endpoint".to_string())));
        let clock = Arc::new(ManualClock::new());
        let provider = provider(http.clone(), global_config(), clock.clone(), 30);

        provider.authorization_header(None).unwrap();
        clock.advance_secs(95);
        assert!(matches!(
            provider.authorization_header(None),
            Err(AuthError::Transport(HttpError::Timeout(_)))
        ));
        assert_eq!(
            provider.cache().get(&RealmKey::Global).unwrap().access_token,
            "abc"
        );
    }

    #[test]
    fn concurrent_callers_for_one_realm_share_a_fetch() {
        let http = Arc::new(ScriptedHttp::new().with_delay(Duration::from_millis(50)));
        http.push(token_response("shared", Some(3600)));
        let provider = Arc::new(ClientCredentialsProvider::new(
            http.clone(),
            CredentialResolver::new(global_config()),
        ));

        let headers: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let provider = provider.clone();
                    scope.spawn(move || provider.authorization_header(Some("west")).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(http.request_count(), 1);
        assert!(headers
            .iter()
            .all(|h| h.as_deref() == Some("Bearer shared")));
    }

    #[test]
    fn slow_realm_does_not_block_other_realms() {
        let (release, gate) = mpsc::channel::<()>();
        let http = Arc::new(ScriptedHttp::new().with_gate("slow", gate));
        http.push(token_response("fast", Some(3600)));
        http.push(token_response("slow", Some(3600)));
        let provider = Arc::new(ClientCredentialsProvider::new(
            http.clone(),
            CredentialResolver::new(global_config()),
        ));

        thread::scope(|scope| {
            let slow_provider = provider.clone();
            let slow = scope.spawn(move || slow_provider.authorization_header(Some("slow")));

            http.wait_for_gated();
            let fast = provider.authorization_header(Some("fast")).unwrap();
            assert_eq!(fast.as_deref(), Some("Bearer fast"));

            release.send(()).unwrap();
            assert_eq!(
                slow.join().unwrap().unwrap().as_deref(),
                Some("Bearer slow")
            );
        });
    }
}
