//! Model Context Protocol surface.
//!
//! Tools: `ingest`, `ask`, `summarize`, `translate`, `extract-images`, and `metrics`.
//! Resources: `mcp://languages`, `mcp://health`, and `mcp://usage`.

mod format;
mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::DocuSmartMcpServer;
