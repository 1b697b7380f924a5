pub mod config;
pub mod server;
pub mod tools;
pub mod transport;

use std::sync::Arc;

use polaris_mcp_core::{ConfigSource, HttpClient, OperationTableError, RestDispatcher};

use config::ServerConfig;
use server::McpServer;
use tools::ToolRegistry;

/// Wires the authorization provider, dispatcher and tool registry together.
/// `http` serves both the token endpoint and the REST API.
pub fn build_server(
    config: &ServerConfig,
    http: Arc<dyn HttpClient>,
    source: Arc<dyn ConfigSource>,
) -> Result<McpServer, OperationTableError> {
    let auth = config.authorization_provider(http.clone(), source);
    let dispatcher = RestDispatcher::new(http, auth, &config.base_url)
        .with_realm_header(config.realm_header.clone())
        .with_timeout(config.http_timeout);
    let registry = ToolRegistry::new(Arc::new(dispatcher))?;
    Ok(McpServer::new(registry))
}
