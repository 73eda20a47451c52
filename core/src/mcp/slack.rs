use rmcp::ErrorData as McpError;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    ListResourceTemplatesResult, ListResourcesResult, PaginatedRequestParams,
    ReadResourceRequestParams, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::schemars::JsonSchema;
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, tool, tool_handler, tool_router};
use serde::Deserialize;
use serde_json::Value;

use super::{
    JSON_MIME, error_json, require_args, resource, resource_template, text_contents, to_json,
    unknown_resource,
};
use crate::context::{ContextError, ContextResolver, DEFAULT_RADIUS};
use crate::slack::{SlackClient, SlackError};

// ---------------------------------------------------------------------------
// Parameter structs
// ---------------------------------------------------------------------------

#[derive(Deserialize, JsonSchema)]
pub struct ListChannelsParams {
    /// Maximum number of channels to return (default 100, max 200)
    pub limit: Option<u32>,
    /// Pagination cursor for next page of results
    pub cursor: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetChannelHistoryParams {
    /// The ID of the channel
    pub channel_id: String,
    /// Number of messages to retrieve (default 10)
    pub limit: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetThreadRepliesParams {
    /// The ID of the channel containing the thread
    pub channel_id: String,
    /// The timestamp of the parent message in the format '1234567890.123456'.
    /// Timestamps without the period can be converted by inserting it so that
    /// six digits follow.
    pub thread_ts: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetUsersParams {
    /// Pagination cursor for next page of results
    pub cursor: Option<String>,
    /// Maximum number of users to return (default 100, max 200)
    pub limit: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetUserProfileParams {
    /// The ID of the user
    pub user_id: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct SearchMessagesParams {
    /// Search query string
    pub query: String,
    /// Optional list of channel IDs to search in. Searches all accessible
    /// channels when omitted.
    pub channels: Option<Vec<String>>,
    /// Maximum number of results to return (default 20, max 100)
    pub limit: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetMessageContextParams {
    /// The ID of the channel containing the message
    pub channel_id: String,
    /// The timestamp of the message to get context for
    pub message_ts: String,
    /// Number of messages to include before and after the target message (default 5)
    pub context_size: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GetThreadContextParams {
    /// The ID of the channel containing the thread
    pub channel_id: String,
    /// The timestamp of the parent message
    pub thread_ts: String,
}

// ---------------------------------------------------------------------------
// Resource URIs
// ---------------------------------------------------------------------------

/// A readable `slack://` resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackResource {
    Channels,
    Users,
    ChannelHistory { channel_id: String },
    Thread { channel_id: String, thread_ts: String },
    UserProfile { user_id: String },
}

impl SlackResource {
    pub fn parse(uri: &str) -> Option<Self> {
        let path = uri.strip_prefix("slack://")?;
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }

        let parsed = match segments.as_slice() {
            ["channels"] => Self::Channels,
            ["users"] => Self::Users,
            ["channel", channel_id, "history"] => Self::ChannelHistory {
                channel_id: channel_id.to_string(),
            },
            ["thread", channel_id, thread_ts] => Self::Thread {
                channel_id: channel_id.to_string(),
                thread_ts: thread_ts.to_string(),
            },
            ["user", user_id, "profile"] => Self::UserProfile {
                user_id: user_id.to_string(),
            },
            _ => return None,
        };
        Some(parsed)
    }

    fn fetch(&self, client: &SlackClient) -> Result<Value, SlackError> {
        match self {
            Self::Channels => client.get_channels(None, None),
            Self::Users => client.get_users(None, None),
            Self::ChannelHistory { channel_id } => client.get_channel_history(channel_id, None),
            Self::Thread {
                channel_id,
                thread_ts,
            } => client.get_thread_replies(channel_id, thread_ts),
            Self::UserProfile { user_id } => client.get_user_profile(user_id),
        }
    }
}

fn context_error_json(err: &ContextError) -> String {
    serde_json::to_string_pretty(&serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
    }))
    .unwrap_or_else(|_| err.to_string())
}

// ---------------------------------------------------------------------------
// SlackServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SlackServer {
    client: SlackClient,
    tool_router: ToolRouter<Self>,
}

impl SlackServer {
    pub fn new(client: SlackClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    /// Run a blocking Web API call off the async runtime and render the raw
    /// response as JSON text.
    async fn passthrough<F>(&self, tool: &'static str, f: F) -> Result<String, String>
    where
        F: FnOnce(&SlackClient) -> Result<Value, SlackError> + Send + 'static,
    {
        let client = self.client.clone();
        let response = tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(|e| error_json(&format!("task error: {e}")))?
            .map_err(|e| {
                tracing::warn!(tool, error = %e, "slack call failed");
                error_json(&e.to_string())
            })?;
        to_json(&response)
    }
}

#[tool_router]
impl SlackServer {
    #[tool(description = "List public channels in the workspace with pagination")]
    async fn slack_list_channels(
        &self,
        Parameters(params): Parameters<ListChannelsParams>,
    ) -> Result<String, String> {
        self.passthrough("slack_list_channels", move |c| {
            c.get_channels(params.limit, params.cursor.as_deref())
        })
        .await
    }

    #[tool(description = "Get recent messages from a channel")]
    async fn slack_get_channel_history(
        &self,
        Parameters(params): Parameters<GetChannelHistoryParams>,
    ) -> Result<String, String> {
        require_args(&[("channel_id", params.channel_id.as_str())])?;
        self.passthrough("slack_get_channel_history", move |c| {
            c.get_channel_history(&params.channel_id, params.limit)
        })
        .await
    }

    #[tool(description = "Get all replies in a message thread")]
    async fn slack_get_thread_replies(
        &self,
        Parameters(params): Parameters<GetThreadRepliesParams>,
    ) -> Result<String, String> {
        require_args(&[
            ("channel_id", params.channel_id.as_str()),
            ("thread_ts", params.thread_ts.as_str()),
        ])?;
        self.passthrough("slack_get_thread_replies", move |c| {
            c.get_thread_replies(&params.channel_id, &params.thread_ts)
        })
        .await
    }

    #[tool(description = "Get a list of all users in the workspace with their basic profile information")]
    async fn slack_get_users(
        &self,
        Parameters(params): Parameters<GetUsersParams>,
    ) -> Result<String, String> {
        self.passthrough("slack_get_users", move |c| {
            c.get_users(params.limit, params.cursor.as_deref())
        })
        .await
    }

    #[tool(description = "Get detailed profile information for a specific user")]
    async fn slack_get_user_profile(
        &self,
        Parameters(params): Parameters<GetUserProfileParams>,
    ) -> Result<String, String> {
        require_args(&[("user_id", params.user_id.as_str())])?;
        self.passthrough("slack_get_user_profile", move |c| {
            c.get_user_profile(&params.user_id)
        })
        .await
    }

    #[tool(description = "Search for messages in channels")]
    async fn slack_search_messages(
        &self,
        Parameters(params): Parameters<SearchMessagesParams>,
    ) -> Result<String, String> {
        require_args(&[("query", params.query.as_str())])?;
        self.passthrough("slack_search_messages", move |c| {
            c.search_messages(&params.query, params.channels.as_deref(), params.limit)
        })
        .await
    }

    #[tool(description = "Get context around a specific message (messages before and after). Returns the surrounding messages newest-first and the index of the target within them.")]
    async fn slack_get_message_context(
        &self,
        Parameters(params): Parameters<GetMessageContextParams>,
    ) -> Result<String, String> {
        require_args(&[
            ("channel_id", params.channel_id.as_str()),
            ("message_ts", params.message_ts.as_str()),
        ])?;
        let radius = params
            .context_size
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_RADIUS);

        let window = ContextResolver::new(&self.client)
            .resolve_context(&params.channel_id, &params.message_ts, radius)
            .await
            .map_err(|e| {
                tracing::warn!(
                    channel = %params.channel_id,
                    ts = %params.message_ts,
                    kind = e.kind(),
                    error = %e,
                    "message context failed"
                );
                context_error_json(&e)
            })?;
        to_json(&window)
    }

    #[tool(description = "Get a thread's messages and context around the parent message")]
    async fn slack_get_thread_context(
        &self,
        Parameters(params): Parameters<GetThreadContextParams>,
    ) -> Result<String, String> {
        require_args(&[
            ("channel_id", params.channel_id.as_str()),
            ("thread_ts", params.thread_ts.as_str()),
        ])?;

        let thread = ContextResolver::new(&self.client)
            .resolve_thread_context(&params.channel_id, &params.thread_ts)
            .await
            .map_err(|e| {
                tracing::warn!(
                    channel = %params.channel_id,
                    ts = %params.thread_ts,
                    kind = e.kind(),
                    error = %e,
                    "thread context failed"
                );
                context_error_json(&e)
            })?;
        to_json(&thread)
    }
}

// ---------------------------------------------------------------------------
// ServerHandler — tools via the router, resources by hand
// ---------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for SlackServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Slack workspace access: list channels and users, read channel history \
                 and threads, search messages, and fetch the conversation around a \
                 specific message or thread."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "courier-slack".to_string(),
                title: Some("Slack MCP Server".to_string()),
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
            resources: vec![
                resource(
                    "slack://channels",
                    "Slack Channels",
                    Some("List of all public channels in the workspace"),
                    JSON_MIME,
                ),
                resource(
                    "slack://users",
                    "Slack Users",
                    Some("List of all users in the workspace"),
                    JSON_MIME,
                ),
            ],
        })
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            meta: None,
            next_cursor: None,
            resource_templates: vec![
                resource_template(
                    "slack://channel/{channel_id}/history",
                    "Channel History",
                    "Get the message history of a specific Slack channel",
                    JSON_MIME,
                )?,
                resource_template(
                    "slack://thread/{channel_id}/{thread_ts}",
                    "Thread Messages",
                    "Get all messages in a specific thread",
                    JSON_MIME,
                )?,
                resource_template(
                    "slack://user/{user_id}/profile",
                    "User Profile",
                    "Get detailed profile information for a specific user",
                    JSON_MIME,
                )?,
            ],
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        let target = SlackResource::parse(&uri).ok_or_else(|| unknown_resource(&uri))?;

        let client = self.client.clone();
        let response = tokio::task::spawn_blocking(move || target.fetch(&client))
            .await
            .map_err(|e| McpError::internal_error(format!("task error: {e}"), None))?
            .map_err(|e| {
                tracing::error!(uri = %uri, error = %e, "error reading resource");
                McpError::internal_error(e.to_string(), None)
            })?;

        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(format!("json error: {e}"), None))?;
        Ok(ReadResourceResult {
            contents: vec![text_contents(&uri, text, JSON_MIME)],
        })
    }
}
