use std::{future::Future, pin::Pin};

use rmcp::ErrorData as McpError;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ReadResourceRequestParam, ReadResourceResult, Resource,
    Tool,
};

use super::server::DocuSmartMcpServer;

pub(crate) type ResourceFuture =
    Pin<Box<dyn Future<Output = Result<ReadResourceResult, McpError>> + Send>>;
pub(crate) type ToolFuture =
    Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send>>;

pub(crate) type ResourceHandler =
    fn(&DocuSmartMcpServer, ReadResourceRequestParam) -> ResourceFuture;
pub(crate) type ToolHandler = fn(&DocuSmartMcpServer, CallToolRequestParam) -> ToolFuture;

/// Tools and resources in registration order, each paired with its handler.
#[derive(Default)]
pub(crate) struct Registry {
    resources: Vec<(Resource, ResourceHandler)>,
    tools: Vec<(Tool, ToolHandler)>,
}

impl Registry {
    pub(crate) fn register_resource(&mut self, resource: Resource, handler: ResourceHandler) {
        self.resources.push((resource, handler));
    }

    pub(crate) fn register_tool(&mut self, tool: Tool, handler: ToolHandler) {
        self.tools.push((tool, handler));
    }

    pub(crate) fn resource(&self, uri: &str) -> Option<ResourceHandler> {
        self.resources
            .iter()
            .find(|(resource, _)| resource.raw.uri == uri)
            .map(|(_, handler)| *handler)
    }

    pub(crate) fn tool(&self, name: &str) -> Option<ToolHandler> {
        self.tools
            .iter()
            .find(|(tool, _)| tool.name == name)
            .map(|(_, handler)| *handler)
    }

    pub(crate) fn resources(&self) -> Vec<Resource> {
        self.resources
            .iter()
            .map(|(resource, _)| resource.clone())
            .collect()
    }

    pub(crate) fn tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|(tool, _)| tool.clone()).collect()
    }
}
