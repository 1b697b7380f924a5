use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::auth::{AuthorizationProvider, DEFAULT_REALM_HEADER};
use crate::error::ToolError;
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::result::ToolExecutionResult;

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const AUTHORIZATION: &str = "Authorization";
const REDACTED: &str = "[REDACTED]";

/// Path prefix a tool's requests live under, relative to the base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiRoot {
    Management,
    Catalog,
    Policy,
}

impl ApiRoot {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Management => "api/management/v1/",
            Self::Catalog => "api/catalog/v1/",
            Self::Policy => "api/catalog/polaris/v1/",
        }
    }
}

/// A validated request, ready to send. Path segments are already encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub realm: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            realm: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_optional_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_realm(mut self, realm: Option<String>) -> Self {
        self.realm = realm;
        self
    }
}

/// Sends descriptors to the REST API and turns responses into tool results.
pub struct RestDispatcher {
    http: Arc<dyn HttpClient>,
    auth: Arc<dyn AuthorizationProvider>,
    base_url: String,
    realm_header: String,
    timeout: Duration,
}

impl RestDispatcher {
    pub fn new(
        http: Arc<dyn HttpClient>,
        auth: Arc<dyn AuthorizationProvider>,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            auth,
            base_url: normalize_base_url(base_url),
            realm_header: DEFAULT_REALM_HEADER.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_realm_header(mut self, header: impl Into<String>) -> Self {
        self.realm_header = header.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn dispatch(
        &self,
        api: ApiRoot,
        descriptor: &RequestDescriptor,
    ) -> Result<ToolExecutionResult, ToolError> {
        let url = self.url(api, descriptor);
        let realm = descriptor.realm.as_deref();

        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.extend(descriptor.headers.clone());
        if descriptor.body.is_some() {
            set_header(&mut headers, "Content-Type", "application/json");
        }

        let caller_authorized = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case(AUTHORIZATION));
        if !caller_authorized {
            if let Some(value) = self.auth.authorization_header(realm)? {
                headers.insert(AUTHORIZATION.to_string(), value);
            }
        }
        if let Some(realm) = realm {
            set_header(&mut headers, &self.realm_header, realm);
        }

        let request = HttpRequest {
            method: descriptor.method,
            url,
            headers,
            body: descriptor.body.as_ref().map(|b| b.to_string().into_bytes()),
            timeout: self.timeout,
        };

        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.http.request(&request)?;
        let is_error = !(200..300).contains(&response.status);
        if is_error {
            warn!(method = %request.method, url = %request.url, status = response.status, "upstream returned error");
        }

        Ok(render(&request, descriptor.body.as_ref(), &response, is_error))
    }

    fn url(&self, api: ApiRoot, descriptor: &RequestDescriptor) -> String {
        let mut url = format!(
            "{}{}{}",
            self.base_url,
            api.prefix(),
            descriptor.path.trim_start_matches('/')
        );
        if !descriptor.query.is_empty() {
            let query = descriptor
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

/// Trims the base URL and guarantees exactly one trailing `/`.
pub fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim().trim_end_matches('/'))
}

fn render(
    request: &HttpRequest,
    body: Option<&Value>,
    response: &HttpResponse,
    is_error: bool,
) -> ToolExecutionResult {
    let raw = String::from_utf8_lossy(&response.data);
    let parsed = if raw.trim().is_empty() {
        None
    } else {
        serde_json::from_str::<Value>(&raw).ok()
    };

    let text = match &parsed {
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| raw.to_string()),
        None if raw.trim().is_empty() => format!(
            "{} {} -> HTTP {} (empty response body)",
            request.method, request.url, response.status
        ),
        None => raw.to_string(),
    };

    let headers: Map<String, Value> = request
        .headers
        .iter()
        .map(|(name, value)| {
            let shown = if name.eq_ignore_ascii_case(AUTHORIZATION) {
                REDACTED
            } else {
                value.as_str()
            };
            (name.clone(), Value::String(shown.to_string()))
        })
        .collect();

    let mut request_meta = json!({
        "method": request.method.as_str(),
        "url": request.url,
        "headers": headers,
    });
    if let Some(body) = body {
        request_meta["body"] = body.clone();
    }

    let response_body = match parsed {
        Some(value) => value,
        None if raw.is_empty() => Value::Null,
        None => Value::String(raw.into_owned()),
    };

    ToolExecutionResult::new(
        text,
        is_error,
        Some(json!({
            "request": request_meta,
            "response": {
                "status": response.status,
                "body": response_body,
            },
        })),
    )
}

/// Replaces any existing header with the same name, ignoring case.
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}
