use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use polaris_mcp_core::{
    normalize_base_url, AuthorizationProvider, ClientCredentialsProvider, ConfigSource,
    CredentialResolver, EnvSource, HttpClient, NoAuthorization, StaticTokenProvider,
};
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://localhost:8181/";
const DEFAULT_REALM_HEADER: &str = "Polaris-Realm";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_BUFFER_SECS: u64 = 60;
const TOKEN_PATH: &str = "api/catalog/v1/oauth/tokens";

const BASE_URL_KEYS: &[&str] = &["POLARIS_BASE_URL", "POLARIS_REST_BASE_URL"];
const TOKEN_KEYS: &[&str] = &["POLARIS_API_TOKEN", "POLARIS_BEARER_TOKEN", "POLARIS_TOKEN"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthMode {
    /// Static token if one is set, else client credentials if any client id is configured.
    Auto,
    None,
    Static,
    ClientCredentials,
}

#[derive(Parser, Debug)]
#[command(name = "polaris-mcp", version, about = "MCP server for Apache Polaris.")]
struct CliArgs {
    /// Polaris base URL. Falls back to POLARIS_BASE_URL, then POLARIS_REST_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Static bearer token. Falls back to POLARIS_API_TOKEN, POLARIS_BEARER_TOKEN, POLARIS_TOKEN.
    #[arg(long)]
    token: Option<String>,

    #[arg(long, env = "POLARIS_AUTH_MODE", value_enum, default_value_t = AuthMode::Auto)]
    auth_mode: AuthMode,

    #[arg(long, env = "POLARIS_REALM_CONTEXT_HEADER_NAME", default_value = DEFAULT_REALM_HEADER)]
    realm_header: String,

    #[arg(long, env = "POLARIS_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "POLARIS_TOKEN_REFRESH_BUFFER_SECS",
        default_value_t = DEFAULT_REFRESH_BUFFER_SECS
    )]
    token_refresh_buffer_secs: u64,
}

/// How outgoing requests are authorized, after `auto` has been resolved.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthSettings {
    None,
    Static(String),
    ClientCredentials,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Static(_) => f.write_str("Static(***)"),
            Self::ClientCredentials => f.write_str("ClientCredentials"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: String,
    pub auth: AuthSettings,
    pub realm_header: String,
    pub http_timeout: Duration,
    pub refresh_buffer: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid {name} value: {value}")]
    InvalidSetting { name: &'static str, value: String },
}

impl ServerConfig {
    pub fn from_args() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse(), Arc::new(EnvSource))
    }

    fn resolve(args: CliArgs, source: Arc<dyn ConfigSource>) -> Result<Self, ConfigError> {
        let base_url = non_blank(args.base_url)
            .or_else(|| source.first(BASE_URL_KEYS))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidSetting {
                name: "base URL",
                value: base_url,
            });
        }
        let base_url = normalize_base_url(&base_url);

        if args.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "POLARIS_HTTP_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        let realm_header = args.realm_header.trim().to_string();
        if realm_header.is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "POLARIS_REALM_CONTEXT_HEADER_NAME",
                value: args.realm_header,
            });
        }

        let token = non_blank(args.token).or_else(|| source.first(TOKEN_KEYS));
        let auth = match (args.auth_mode, token) {
            (AuthMode::None, _) => AuthSettings::None,
            (AuthMode::Static, Some(token)) | (AuthMode::Auto, Some(token)) => {
                AuthSettings::Static(token)
            }
            (AuthMode::Static, None) => return Err(ConfigError::MissingSetting("POLARIS_API_TOKEN")),
            (AuthMode::ClientCredentials, _) => AuthSettings::ClientCredentials,
            (AuthMode::Auto, None) => {
                if CredentialResolver::new(source).any_configured() {
                    AuthSettings::ClientCredentials
                } else {
                    AuthSettings::None
                }
            }
        };

        Ok(Self {
            base_url,
            auth,
            realm_header,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            refresh_buffer: Duration::from_secs(args.token_refresh_buffer_secs),
        })
    }

    pub fn default_token_endpoint(&self) -> String {
        format!("{}{}", self.base_url, TOKEN_PATH)
    }

    /// Builds the provider for the resolved auth mode. Client credentials are
    /// read from `source` on every call, not here.
    pub fn authorization_provider(
        &self,
        http: Arc<dyn HttpClient>,
        source: Arc<dyn ConfigSource>,
    ) -> Arc<dyn AuthorizationProvider> {
        match &self.auth {
            AuthSettings::None => Arc::new(NoAuthorization),
            AuthSettings::Static(token) => Arc::new(StaticTokenProvider::new(token.clone())),
            AuthSettings::ClientCredentials => {
                let credentials = CredentialResolver::new(source)
                    .with_default_token_endpoint(self.default_token_endpoint());
                Arc::new(
                    ClientCredentialsProvider::new(http, credentials)
                        .with_refresh_buffer(self.refresh_buffer)
                        .with_timeout(self.http_timeout)
                        .with_realm_header(self.realm_header.clone()),
                )
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_args() -> CliArgs {
        CliArgs {
            base_url: None,
            token: None,
            auth_mode: AuthMode::Auto,
            realm_header: DEFAULT_REALM_HEADER.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            token_refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
        }
    }

    fn source(pairs: &[(&str, &str)]) -> Arc<dyn ConfigSource> {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn defaults_without_any_settings() {
        let config = ServerConfig::resolve(base_args(), source(&[])).expect("config should resolve");
        assert_eq!(config.base_url, "http://localhost:8181/");
        assert_eq!(config.auth, AuthSettings::None);
        assert_eq!(config.realm_header, "Polaris-Realm");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.refresh_buffer, Duration::from_secs(60));
        assert_eq!(
            config.default_token_endpoint(),
            "http://localhost:8181/api/catalog/v1/oauth/tokens"
        );
    }

    #[test]
    fn base_url_falls_back_through_env_names() {
        let env = source(&[("POLARIS_BASE_URL", "  "), ("POLARIS_REST_BASE_URL", "https://polaris:8443")]);
        let config = ServerConfig::resolve(base_args(), env.clone()).unwrap();
        assert_eq!(config.base_url, "https://polaris:8443/");

        let mut args = base_args();
        args.base_url = Some("http://cli:1234///".to_string());
        let config = ServerConfig::resolve(args, env.clone()).unwrap();
        assert_eq!(config.base_url, "http://cli:1234/");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let mut args = base_args();
        args.base_url = Some("polaris:8181".to_string());
        assert!(matches!(
            ServerConfig::resolve(args, source(&[])),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn auto_prefers_static_token() {
        let env = source(&[
            ("POLARIS_BEARER_TOKEN", " tok "),
            ("POLARIS_CLIENT_ID", "client"),
        ]);
        let config = ServerConfig::resolve(base_args(), env.clone()).unwrap();
        assert_eq!(config.auth, AuthSettings::Static("tok".to_string()));
    }

    #[test]
    fn auto_picks_client_credentials_for_realm_only_setup() {
        let env = source(&[("POLARIS_REALM_WEST_CLIENT_ID", "west")]);
        let config = ServerConfig::resolve(base_args(), env.clone()).unwrap();
        assert_eq!(config.auth, AuthSettings::ClientCredentials);
    }

    #[test]
    fn static_mode_requires_token() {
        let mut args = base_args();
        args.auth_mode = AuthMode::Static;
        assert!(matches!(
            ServerConfig::resolve(args, source(&[])),
            Err(ConfigError::MissingSetting(_))
        ));
    }

    #[test]
    fn explicit_none_ignores_token() {
        let mut args = base_args();
        args.auth_mode = AuthMode::None;
        args.token = Some("tok".to_string());
        let config = ServerConfig::resolve(args, source(&[])).unwrap();
        assert_eq!(config.auth, AuthSettings::None);
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut args = base_args();
        args.http_timeout_secs = 0;
        assert!(ServerConfig::resolve(args, source(&[])).is_err());
    }

    #[test]
    fn debug_output_hides_static_token() {
        let rendered = format!("{:?}", AuthSettings::Static("hunter2".to_string()));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn cli_parses_auth_mode() {
        let args = CliArgs::try_parse_from(["polaris-mcp", "--auth-mode", "client-credentials"]).unwrap();
        assert_eq!(args.auth_mode, AuthMode::ClientCredentials);
    }
}
