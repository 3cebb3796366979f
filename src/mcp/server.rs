//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    mcp::{
        format::{json_resource_contents, languages_payload, serialize_json},
        handlers::{
            answer::{AskToolRequest, handle_ask},
            documents::{PathToolRequest, handle_extract_images, handle_ingest},
            metrics::handle_metrics,
            text::{SummarizeToolRequest, TranslateToolRequest, handle_summarize, handle_translate},
        },
        registry, schemas,
    },
    processing::DocumentApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};
use serde_json::{Map, Value};

const LANGUAGES_URI: &str = "mcp://languages";
const HEALTH_URI: &str = "mcp://health";
const USAGE_URI: &str = "mcp://usage";

/// MCP server exposing DocuSmart operations over any rmcp transport.
#[derive(Clone)]
pub struct DocuSmartMcpServer {
    api: Arc<dyn DocumentApi>,
    registry: Arc<registry::Registry>,
}

impl DocuSmartMcpServer {
    /// Create a server that forwards every tool call to `api`.
    pub fn new(api: Arc<dyn DocumentApi>) -> Self {
        let mut registry = registry::Registry::default();

        registry.register_resource(
            resource(
                LANGUAGES_URI,
                "languages",
                "Translation targets the server knows by name",
            ),
            resource_languages,
        );
        registry.register_resource(
            resource(
                HEALTH_URI,
                "health",
                "Vector store description, reachability, and record count",
            ),
            resource_health,
        );
        registry.register_resource(
            resource(
                USAGE_URI,
                "usage",
                "Documents ingested, questions answered, and token usage since startup",
            ),
            resource_usage,
        );

        registry.register_tool(
            tool(
                "ingest",
                "Ingest Document",
                "Load a PDF, text, or Word file, then chunk, embed, and store it for questions.",
                schemas::input_schema::<PathToolRequest>(),
                ToolAnnotations::with_title("Ingest Document")
                    .destructive(false)
                    .idempotent(false)
                    .open_world(false),
            ),
            tool_ingest,
        );
        registry.register_tool(
            tool(
                "ask",
                "Ask Question",
                "Answer a question from the three most similar stored chunks.",
                schemas::input_schema::<AskToolRequest>(),
                ToolAnnotations::with_title("Ask Question")
                    .read_only(true)
                    .open_world(true),
            ),
            tool_ask,
        );
        registry.register_tool(
            tool(
                "summarize",
                "Summarize",
                "Summarize inline text or the extracted text of a document on disk.",
                schemas::input_schema::<SummarizeToolRequest>(),
                ToolAnnotations::with_title("Summarize")
                    .read_only(true)
                    .open_world(true),
            ),
            tool_summarize,
        );
        registry.register_tool(
            tool(
                "translate",
                "Translate",
                "Translate text into a target language code such as fr, es, or de.",
                schemas::input_schema::<TranslateToolRequest>(),
                ToolAnnotations::with_title("Translate")
                    .read_only(true)
                    .open_world(true),
            ),
            tool_translate,
        );
        registry.register_tool(
            tool(
                "extract-images",
                "Extract Images",
                "Return the images embedded in a PDF as base64 with page numbers.",
                schemas::input_schema::<PathToolRequest>(),
                ToolAnnotations::with_title("Extract Images")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool_extract_images,
        );
        registry.register_tool(
            tool(
                "metrics",
                "Usage Metrics",
                "Check ingestion volume and generation token usage at a glance.",
                schemas::empty_object_schema(),
                ToolAnnotations::with_title("Usage Metrics")
                    .read_only(true)
                    .idempotent(true)
                    .open_world(false),
            ),
            tool_metrics,
        );

        Self {
            api,
            registry: Arc::new(registry),
        }
    }
}

fn resource(uri: &'static str, name: &'static str, description: &'static str) -> Resource {
    let mut raw = RawResource::new(uri, name);
    raw.description = Some(description.into());
    raw.mime_type = Some(super::format::APPLICATION_JSON.into());
    raw.no_annotation()
}

fn tool(
    name: &'static str,
    title: &'static str,
    description: &'static str,
    input_schema: Map<String, Value>,
    annotations: ToolAnnotations,
) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        title: Some(title.to_string()),
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(input_schema),
        output_schema: None,
        annotations: Some(annotations),
        icons: None,
    }
}

fn resource_languages(
    _server: &DocuSmartMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                LANGUAGES_URI,
                serialize_json(&languages_payload(), LANGUAGES_URI),
            )],
        })
    })
}

fn resource_health(
    server: &DocuSmartMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let api = server.api.clone();
    Box::pin(async move {
        let snapshot = api.health().await;
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                HEALTH_URI,
                serialize_json(&snapshot, HEALTH_URI),
            )],
        })
    })
}

fn resource_usage(
    server: &DocuSmartMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let snapshot = server.api.metrics_snapshot();
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                USAGE_URI,
                serialize_json(&snapshot, USAGE_URI),
            )],
        })
    })
}

fn tool_ingest(
    server: &DocuSmartMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_ingest(&api, request.arguments).await })
}

fn tool_ask(server: &DocuSmartMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_ask(&api, request.arguments).await })
}

fn tool_summarize(
    server: &DocuSmartMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_summarize(&api, request.arguments).await })
}

fn tool_translate(
    server: &DocuSmartMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_translate(&api, request.arguments).await })
}

fn tool_extract_images(
    server: &DocuSmartMcpServer,
    request: CallToolRequestParam,
) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_extract_images(&api, request.arguments).await })
}

fn tool_metrics(
    server: &DocuSmartMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let api = server.api.clone();
    Box::pin(async move { handle_metrics(&api).await })
}

impl ServerHandler for DocuSmartMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "docusmart".to_string();
        implementation.title = Some("DocuSmart MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Ingest documents from disk, then ask questions answered from their closest chunks. Summarize or translate text directly, and pull embedded images out of PDFs.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListResourcesResult::with_all_items(
            self.registry.resources(),
        )))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.registry.tools())))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            match self.registry.resource(&request.uri) {
                Some(handler) => handler(self, request).await,
                None => Err(McpError::invalid_params(
                    format!("Unknown resource URI: {}", request.uri),
                    None,
                )),
            }
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            match self.registry.tool(&request.name) {
                Some(handler) => {
                    tracing::debug!(tool = %request.name, "Dispatching MCP tool call");
                    handler(self, request).await
                }
                None => Err(McpError::invalid_params(
                    format!("Unknown tool: {}", request.name),
                    None,
                )),
            }
        }
    }
}
