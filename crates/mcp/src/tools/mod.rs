mod catalog;
mod catalog_role;
mod namespace;
mod policy;
mod principal;
mod principal_role;
mod table;

use std::sync::Arc;

use polaris_mcp_core::{
    ApiRoot, OperationTableError, RequestDescriptor, RestDispatcher, ToolArguments, ToolError,
    ToolExecutionResult, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

pub use catalog::CatalogTool;
pub use catalog_role::CatalogRoleTool;
pub use namespace::NamespaceTool;
pub use policy::PolicyTool;
pub use principal::PrincipalTool;
pub use principal_role::PrincipalRoleTool;
pub use table::TableTool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A request built from tool arguments, plus the hint to attach if the
/// upstream rejects its payload.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub operation: &'static str,
    pub request: RequestDescriptor,
    pub hint: Option<&'static str>,
}

/// One MCP tool backed by a REST resource.
pub trait ResourceTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    fn api(&self) -> ApiRoot;
    /// Checks the tool's operation alias table.
    fn check_operations(&self) -> Result<(), OperationTableError>;
    /// Validates arguments and builds the request. Never touches the network.
    fn prepare(&self, args: ToolArguments<'_>) -> Result<Prepared, ValidationError>;
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl From<ValidationError> for CallError {
    fn from(err: ValidationError) -> Self {
        Self::Tool(ToolError::Validation(err))
    }
}

pub struct ToolRegistry {
    dispatcher: Arc<RestDispatcher>,
    tools: Vec<Box<dyn ResourceTool>>,
}

impl ToolRegistry {
    /// Registers every Polaris tool. Fails if any alias table is inconsistent.
    pub fn new(dispatcher: Arc<RestDispatcher>) -> Result<Self, OperationTableError> {
        let tools: Vec<Box<dyn ResourceTool>> = vec![
            Box::new(CatalogTool),
            Box::new(NamespaceTool),
            Box::new(TableTool),
            Box::new(PrincipalTool),
            Box::new(PrincipalRoleTool),
            Box::new(CatalogRoleTool),
            Box::new(PolicyTool),
        ];
        for tool in &tools {
            tool.check_operations()?;
        }
        Ok(Self { dispatcher, tools })
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn call(&self, name: &str, arguments: &Value) -> Result<ToolExecutionResult, CallError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| CallError::UnknownTool(name.to_string()))?;

        let args = ToolArguments::from_value(arguments)?;
        let prepared = tool.prepare(args)?;
        debug!(
            tool = name,
            operation = prepared.operation,
            method = %prepared.request.method,
            path = %prepared.request.path,
            "prepared request"
        );

        let result = self.dispatcher.dispatch(tool.api(), &prepared.request)?;
        Ok(match prepared.hint {
            Some(hint) => result.with_error_hint(hint),
            None => result,
        })
    }
}

/// Adds caller-supplied query parameters, headers and realm to `request`.
/// Parameters the tool already set come first.
pub(crate) fn finish(
    args: ToolArguments<'_>,
    mut request: RequestDescriptor,
) -> Result<RequestDescriptor, ValidationError> {
    request.query.extend(args.query()?);
    request.headers = args.headers()?;
    request.realm = args.realm();
    Ok(request)
}

/// Input schema shared by every tool: `operation` plus the transport
/// passthroughs, merged with the tool's own identifier properties.
pub(crate) fn schema(operations: Vec<&'static str>, identifiers: Value, body_description: &str) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "operation".to_string(),
        json!({
            "type": "string",
            "enum": operations,
            "description": "Operation to perform. Common synonyms such as ls, fetch or drop are also accepted."
        }),
    );
    if let Value::Object(identifiers) = identifiers {
        properties.extend(identifiers);
    }
    properties.insert(
        "body".to_string(),
        json!({"type": "object", "description": body_description}),
    );
    properties.insert(
        "query".to_string(),
        json!({
            "type": "object",
            "description": "Optional query parameters. Array values are sent as repeated parameters.",
            "additionalProperties": {"type": ["string", "number", "boolean", "array", "null"]}
        }),
    );
    properties.insert(
        "headers".to_string(),
        json!({
            "type": "object",
            "description": "Optional request headers. Array values are joined with commas.",
            "additionalProperties": {"type": ["string", "number", "boolean", "array", "null"]}
        }),
    );
    properties.insert(
        "realm".to_string(),
        json!({
            "type": "string",
            "description": "Optional realm. Selects realm-specific credentials and is sent in the realm header."
        }),
    );

    json!({
        "type": "object",
        "properties": properties,
        "required": ["operation"],
        "additionalProperties": true
    })
}

pub(crate) fn namespace_property() -> Value {
    json!({
        "anyOf": [
            {"type": "string"},
            {"type": "array", "items": {"type": "string"}, "minItems": 1}
        ],
        "description": "Namespace as a dotted string (\"analytics.daily\") or an array of levels."
    })
}

pub(crate) fn name_property(description: &str) -> Value {
    json!({"type": "string", "description": description})
}
