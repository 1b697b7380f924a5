use serde_json::Value;

use crate::error::ValidationError;

/// Multi-level namespace delimiter understood by the catalog API (ASCII unit separator).
pub const NAMESPACE_SEPARATOR: &str = "\u{1f}";

const NAMESPACE_FIELD: &str = "namespace";

/// Percent-encodes a single path segment after trimming surrounding whitespace.
pub fn encode_segment(raw: &str) -> String {
    urlencoding::encode(raw.trim()).into_owned()
}

/// A namespace as supplied by a caller: either `"a.b"` or `["a", "b"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSpec {
    Dotted(String),
    Levels(Vec<String>),
}

impl NamespaceSpec {
    /// Normalizes a loosely-typed JSON value. Numbers and booleans inside an
    /// array are accepted as their text form.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        match value {
            Value::String(s) => Ok(Self::Dotted(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    Value::Bool(b) => Ok(b.to_string()),
                    _ => Err(blank_level()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Levels),
            Value::Null => Err(not_provided()),
            _ => Err(ValidationError::new(
                NAMESPACE_FIELD,
                "Namespace must be a string or an array of strings.",
            )),
        }
    }

    /// Trimmed, validated levels.
    pub fn levels(&self) -> Result<Vec<String>, ValidationError> {
        let raw: Vec<&str> = match self {
            Self::Dotted(s) => {
                if s.trim().is_empty() {
                    return Err(not_provided());
                }
                s.split('.').collect()
            }
            Self::Levels(levels) => {
                if levels.is_empty() {
                    return Err(ValidationError::new(
                        NAMESPACE_FIELD,
                        "Namespace array must contain at least one element.",
                    ));
                }
                levels.iter().map(String::as_str).collect()
            }
        };

        raw.into_iter()
            .map(|level| {
                let level = level.trim();
                if level.is_empty() {
                    Err(blank_level())
                } else {
                    Ok(level.to_string())
                }
            })
            .collect()
    }

    /// Levels joined with [`NAMESPACE_SEPARATOR`], not yet percent-encoded.
    pub fn joined(&self) -> Result<String, ValidationError> {
        Ok(self.levels()?.join(NAMESPACE_SEPARATOR))
    }

    /// Like [`Self::joined`], but a string is taken as a single level and
    /// keeps its dots. Arrays still join with [`NAMESPACE_SEPARATOR`].
    pub fn joined_unsplit(&self) -> Result<String, ValidationError> {
        match self {
            Self::Dotted(s) => {
                let level = s.trim();
                if level.is_empty() {
                    return Err(not_provided());
                }
                Ok(level.to_string())
            }
            Self::Levels(_) => self.joined(),
        }
    }
}

impl From<&str> for NamespaceSpec {
    fn from(s: &str) -> Self {
        Self::Dotted(s.to_string())
    }
}

impl From<Vec<String>> for NamespaceSpec {
    fn from(levels: Vec<String>) -> Self {
        Self::Levels(levels)
    }
}

/// Joins the levels first, then encodes once so the separator becomes `%1F`.
pub fn encode_namespace(spec: &NamespaceSpec) -> Result<String, ValidationError> {
    Ok(encode_segment(&spec.joined()?))
}

pub(crate) fn not_provided() -> ValidationError {
    ValidationError::new(NAMESPACE_FIELD, "Namespace must be provided.")
}

fn blank_level() -> ValidationError {
    ValidationError::new(
        NAMESPACE_FIELD,
        "Namespace array elements must not be blank.",
    )
}
