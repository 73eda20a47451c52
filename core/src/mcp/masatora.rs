use rmcp::ErrorData as McpError;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    ListResourcesResult, PaginatedRequestParams, ReadResourceRequestParams, ReadResourceResult,
    ServerCapabilities, ServerInfo,
};
use rmcp::schemars::JsonSchema;
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;

use super::{resource, text_contents, unknown_resource};
use crate::translate::{INFO_TEXT, INFO_URI, render_translation};

#[derive(Deserialize, JsonSchema)]
pub struct TranslateParams {
    /// Text that may contain 'masatora'
    pub text: String,
}

#[derive(Clone)]
pub struct MasatoraServer {
    tool_router: ToolRouter<Self>,
}

impl MasatoraServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for MasatoraServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MasatoraServer {
    /// Contents of `masatora://info`, the only resource this server has.
    pub fn read_info(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        if uri != INFO_URI {
            return Err(unknown_resource(uri));
        }
        Ok(ReadResourceResult {
            contents: vec![text_contents(INFO_URI, INFO_TEXT.to_string(), "text/plain")],
        })
    }
}

#[tool_router]
impl MasatoraServer {
    #[tool(description = "Translates the word 'masatora' to its true meaning")]
    fn translate_masatora(&self, Parameters(params): Parameters<TranslateParams>) -> String {
        render_translation(&params.text)
    }
}

#[tool_handler]
impl ServerHandler for MasatoraServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Explains and translates the word 'masatora'.".into()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "masatora".to_string(),
                title: Some("Masatora MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources: vec![resource(
                INFO_URI,
                "Masatora Information",
                Some("Information about Masatora"),
                "text/plain",
            )],
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_info(&request.uri)
    }
}
