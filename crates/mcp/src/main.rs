use std::sync::Arc;

use anyhow::Result;
use polaris_mcp::build_server;
use polaris_mcp::config::ServerConfig;
use polaris_mcp::server::McpServer;
use polaris_mcp_core::{EnvSource, HttpClient, ReqwestHttpClient};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

const DEFAULT_LOG_FILTER: &str = "polaris_mcp=info,polaris_mcp_core=info";

fn main() -> Result<()> {
    // stdout carries the JSON-RPC stream, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let config = ServerConfig::from_args()?;

    // The blocking HTTP client must be created and dropped outside the runtime.
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    let server = Arc::new(build_server(&config, http, Arc::new(EnvSource))?);
    info!(
        base_url = %config.base_url,
        auth = ?config.auth,
        realm_header = %config.realm_header,
        "starting polaris-mcp"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(server.clone()));
    drop(runtime);
    drop(server);

    info!("stdin closed, shutting down");
    result
}

/// Reads one message per line from stdin. Each message is handled on the
/// blocking pool; a single writer task serializes responses onto stdout.
async fn serve(server: Arc<McpServer>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut inflight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let server = server.clone();
        let tx = tx.clone();
        inflight.spawn_blocking(move || {
            if let Some(response) = server.handle_request(&line) {
                // Only fails once the writer is gone, i.e. stdout is closed.
                let _ = tx.send(response);
            }
        });

        while let Some(done) = inflight.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "request handler panicked");
            }
        }
    }

    while let Some(done) = inflight.join_next().await {
        if let Err(e) = done {
            warn!(error = %e, "request handler panicked");
        }
    }

    drop(tx);
    writer.await??;
    Ok(())
}
