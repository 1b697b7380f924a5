use thiserror::Error;

/// A rejected tool argument. Raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    field: String,
    message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, format!("Missing required field: {}", field))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("http error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("token request failed with status {status}")]
    Status { status: u16, body: String },
    #[error("token response is invalid JSON: {0}")]
    InvalidJson(String),
    #[error("token response missing access_token")]
    MissingAccessToken,
    #[error("token request failed: {0}")]
    Transport(#[from] HttpError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("authorization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("request failed: {0}")]
    Transport(#[from] HttpError),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationError::new(field, message))
    }

    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// A malformed operation alias table, detected at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationTableError {
    #[error("{tool}: alias '{alias}' maps to both '{first}' and '{second}'")]
    DuplicateAlias {
        tool: &'static str,
        alias: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("{tool}: alias '{alias}' is not lower-case and trimmed")]
    NotNormalized {
        tool: &'static str,
        alias: &'static str,
    },
}
