use serde::Serialize;
use serde_json::{Map, Value};

/// HTTP statuses for which a per-tool payload hint is attached.
pub const HINTED_STATUSES: [u16; 2] = [400, 409];

/// Outcome of one dispatched tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolExecutionResult {
    text: String,
    is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl ToolExecutionResult {
    pub fn new(text: impl Into<String>, is_error: bool, metadata: Option<Value>) -> Self {
        Self {
            text: text.into(),
            is_error,
            metadata,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    /// `metadata.response.status`, when present.
    pub fn status(&self) -> Option<u16> {
        self.metadata
            .as_ref()?
            .get("response")?
            .get("status")?
            .as_u64()
            .and_then(|s| u16::try_from(s).ok())
    }

    /// Returns a copy carrying `hint` if this is an error result with a
    /// 400 or 409 status. Otherwise returns `self` untouched.
    pub fn with_error_hint(self, hint: &str) -> Self {
        if !self.is_error || !self.status().is_some_and(|s| HINTED_STATUSES.contains(&s)) {
            return self;
        }

        let mut metadata = match self.metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        metadata.insert("hint".to_string(), Value::String(hint.to_string()));

        let text = if self.text.contains(hint) {
            self.text
        } else {
            format!("{}\nHint: {}", self.text, hint)
        };

        Self {
            text,
            is_error: true,
            metadata: Some(Value::Object(metadata)),
        }
    }
}
