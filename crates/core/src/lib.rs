pub mod args;
pub mod auth;
pub mod error;
pub mod http;
pub mod operation;
pub mod path;
pub mod rest;
pub mod result;
#[cfg(test)]
mod testutils;

pub use args::{BodyShape, ToolArguments};
pub use auth::{
    AuthorizationProvider, ClientCredentialsProvider, Clock, ConfigSource, CredentialResolver,
    Credentials, EnvSource, NoAuthorization, RealmKey, StaticTokenProvider, SystemClock,
    TokenCache, TokenCacheEntry,
};
pub use error::{AuthError, HttpError, OperationTableError, ToolError, ValidationError};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestHttpClient};
pub use operation::{OperationEntry, OperationTable};
pub use path::{encode_namespace, encode_segment, NamespaceSpec, NAMESPACE_SEPARATOR};
pub use rest::{normalize_base_url, ApiRoot, RequestDescriptor, RestDispatcher};
pub use result::ToolExecutionResult;
