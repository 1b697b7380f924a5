use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::path::{encode_namespace, encode_segment, not_provided, NamespaceSpec};

/// Borrowed view over a tool call's argument object.
///
/// Every accessor that hands data onward returns an owned copy, so nothing the
/// caller does to its own value afterwards can reach a built request.
#[derive(Debug, Clone, Copy)]
pub struct ToolArguments<'a> {
    values: &'a Map<String, Value>,
}

/// Names the request document a body-carrying operation expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyShape {
    pub verb: &'static str,
    pub shape: &'static str,
}

impl BodyShape {
    pub const fn new(verb: &'static str, shape: &'static str) -> Self {
        Self { verb, shape }
    }

    fn error(&self) -> ValidationError {
        ValidationError::new(
            "body",
            format!(
                "{} operations require a body matching {}.",
                self.verb, self.shape
            ),
        )
    }
}

impl<'a> ToolArguments<'a> {
    pub fn from_value(value: &'a Value) -> Result<Self, ValidationError> {
        value
            .as_object()
            .map(|values| Self { values })
            .ok_or_else(|| ValidationError::new("arguments", "Tool arguments must be a JSON object."))
    }

    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.values.get(field)
    }

    /// The operation exactly as sent; blank values count as missing.
    /// Normalization is left to the operation table.
    pub fn operation(&self) -> Result<&'a str, ValidationError> {
        self.values
            .get("operation")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::missing("operation"))
    }

    /// A non-blank string, trimmed.
    pub fn require_text(&self, field: &str) -> Result<&'a str, ValidationError> {
        self.optional_text(field)
            .ok_or_else(|| ValidationError::missing(field))
    }

    pub fn optional_text(&self, field: &str) -> Option<&'a str> {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Required identifier, percent-encoded for use as a path segment.
    pub fn segment(&self, field: &str) -> Result<String, ValidationError> {
        self.require_text(field).map(encode_segment)
    }

    /// Like [`Self::segment`] but with a resource-specific message.
    pub fn segment_or(&self, field: &str, message: &str) -> Result<String, ValidationError> {
        self.segment(field)
            .map_err(|_| ValidationError::new(field, message))
    }

    pub fn namespace(&self) -> Result<NamespaceSpec, ValidationError> {
        self.optional_namespace()?.ok_or_else(not_provided)
    }

    pub fn optional_namespace(&self) -> Result<Option<NamespaceSpec>, ValidationError> {
        match self.values.get("namespace") {
            None | Some(Value::Null) => Ok(None),
            Some(value) => NamespaceSpec::from_value(value).map(Some),
        }
    }

    pub fn namespace_segment(&self) -> Result<String, ValidationError> {
        encode_namespace(&self.namespace()?)
    }

    /// Encoded namespace where a string argument is one level, dots included.
    pub fn unsplit_namespace_segment(&self) -> Result<String, ValidationError> {
        Ok(encode_segment(&self.namespace()?.joined_unsplit()?))
    }

    /// Deep copy of a required object body.
    pub fn body(&self, shape: BodyShape) -> Result<Value, ValidationError> {
        match self.values.get("body") {
            Some(Value::Object(body)) => Ok(Value::Object(body.clone())),
            _ => Err(shape.error()),
        }
    }

    /// Deep copy of an optional object body. A present non-object is still rejected.
    pub fn optional_body(&self, shape: BodyShape) -> Result<Option<Value>, ValidationError> {
        match self.values.get("body") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(body)) => Ok(Some(Value::Object(body.clone()))),
            Some(_) => Err(shape.error()),
        }
    }

    /// Query parameters with nulls dropped and every value stringified.
    /// Array values expand into repeated pairs.
    pub fn query(&self) -> Result<Vec<(String, String)>, ValidationError> {
        let Some(map) = self.mapping("query")? else {
            return Ok(Vec::new());
        };

        let mut pairs = Vec::new();
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::Array(items) => pairs.extend(
                    items
                        .iter()
                        .filter_map(stringify)
                        .map(|item| (key.clone(), item)),
                ),
                other => pairs.extend(stringify(other).map(|v| (key.clone(), v))),
            }
        }
        Ok(pairs)
    }

    /// Header values with nulls dropped and every value stringified.
    /// Array values are joined with `", "`.
    pub fn headers(&self) -> Result<BTreeMap<String, String>, ValidationError> {
        let Some(map) = self.mapping("headers")? else {
            return Ok(BTreeMap::new());
        };

        Ok(map
            .iter()
            .filter_map(|(key, value)| {
                let rendered = match value {
                    Value::Array(items) => {
                        let parts: Vec<String> = items.iter().filter_map(stringify).collect();
                        (!parts.is_empty()).then(|| parts.join(", "))
                    }
                    other => stringify(other),
                };
                rendered.map(|v| (key.clone(), v))
            })
            .collect())
    }

    /// Realm identifier, if one was given and is non-blank. Passed on as-is.
    pub fn realm(&self) -> Option<String> {
        self.values
            .get("realm")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    }

    fn mapping(&self, field: &str) -> Result<Option<&'a Map<String, Value>>, ValidationError> {
        match self.values.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(ValidationError::new(
                field,
                format!("{} must be a JSON object.", field),
            )),
        }
    }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
