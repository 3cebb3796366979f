//! MCP server entrypoint (stdio transport).
//!
//! Exposes the DocuSmart tools and resources over stdio for editor and agent integrations. Shares
//! configuration and the vector store with the HTTP binary; logs go to stderr and the log file so
//! stdout stays reserved for protocol frames.
use anyhow::{Context, Result};
use docusmart::{
    config, logging,
    mcp::DocuSmartMcpServer,
    processing::{DocumentService, Workspace},
    store::{StoreLocation, open_store},
};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let location = StoreLocation::from_config(config)?;
    let store = open_store(&location)
        .await
        .context("Failed to open vector store")?;
    let service = DocumentService::from_config(config).context("Failed to build providers")?;
    let server = DocuSmartMcpServer::new(Arc::new(Workspace::new(service, store)));

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
