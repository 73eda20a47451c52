use std::sync::{Arc, Mutex};

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

use super::{JSON_MIME, error_json, resource, text_contents, to_json, unknown_resource};
use crate::db::Database;

const SCHEMA_PATH: &str = "schema";

#[derive(Deserialize, JsonSchema)]
pub struct QueryParams {
    /// SQL statement to run. The connection is read-only and the enclosing
    /// transaction is always rolled back.
    pub sql: String,
}

// ---------------------------------------------------------------------------
// Resource URIs — sqlite://{db_name}/{table}/schema
// ---------------------------------------------------------------------------

pub fn schema_uri(db_name: &str, table: &str) -> String {
    format!("sqlite://{db_name}/{table}/{SCHEMA_PATH}")
}

/// Outcome of parsing a `sqlite://` resource URI.
#[derive(Debug, PartialEq, Eq)]
pub enum SchemaRequest<'a> {
    /// `sqlite://{db_name}/{table}/schema` for the open database.
    Table(&'a str),
    /// Wrong segment count, a path other than `schema`, or another database.
    InvalidPath,
}

impl<'a> SchemaRequest<'a> {
    /// Parse `uri` against the database named `db_name`. Returns `None` for
    /// URIs outside the `sqlite://` scheme.
    pub fn parse(uri: &'a str, db_name: &str) -> Option<Self> {
        let path = uri.strip_prefix("sqlite://")?;
        let segments: Vec<&'a str> = path.split('/').collect();

        let parsed = match segments.as_slice() {
            [db, table, SCHEMA_PATH] if *db == db_name && !table.is_empty() => {
                Self::Table(*table)
            }
            _ => Self::InvalidPath,
        };
        Some(parsed)
    }
}

// ---------------------------------------------------------------------------
// SqliteServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SqliteServer {
    db: Arc<Mutex<Database>>,
    tool_router: ToolRouter<Self>,
}

impl SqliteServer {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self {
            db,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SqliteServer {
    #[tool(description = "Run a read-only SQL query")]
    fn query(&self, Parameters(params): Parameters<QueryParams>) -> Result<String, String> {
        tracing::info!(sql = %params.sql, "running query");
        let rows = {
            let db = self.db.lock().map_err(|e| format!("lock error: {e}"))?;
            db.run_query(&params.sql).map_err(|e| {
                tracing::warn!(error = %e, "query failed");
                format!("SQL query failed: {e:#}")
            })?
        };
        tracing::info!(rows = rows.len(), "query complete");
        to_json(&rows)
    }
}

#[tool_handler]
impl ServerHandler for SqliteServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Read-only SQLite access: table schemas are exposed as resources and \
                 the `query` tool runs SQL inside a transaction that is always rolled back."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: rmcp::model::Implementation {
                name: "courier-sqlite".to_string(),
                title: Some("SQLite MCP Server".to_string()),
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
        let listed = {
            let db = self
                .db
                .lock()
                .map_err(|e| McpError::internal_error(format!("lock error: {e}"), None))?;
            db.list_tables().map(|tables| (db.name().to_string(), tables))
        };

        // A failed listing still answers with an empty resource list.
        let resources = match listed {
            Ok((db_name, tables)) => {
                tracing::debug!(tables = tables.len(), "listed tables");
                tables
                    .iter()
                    .map(|table| {
                        resource(
                            &schema_uri(&db_name, table),
                            &format!("\"{table}\" database schema"),
                            None,
                            JSON_MIME,
                        )
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to list tables");
                Vec::new()
            }
        };

        Ok(ListResourcesResult {
            meta: None,
            next_cursor: None,
            resources,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let uri = request.uri;
        let text = {
            let db = self
                .db
                .lock()
                .map_err(|e| McpError::internal_error(format!("lock error: {e}"), None))?;
            let parsed =
                SchemaRequest::parse(&uri, db.name()).ok_or_else(|| unknown_resource(&uri))?;

            match parsed {
                SchemaRequest::InvalidPath => {
                    tracing::warn!(uri = %uri, db = db.name(), "invalid schema resource path");
                    error_json(&format!(
                        "Invalid resource URI: expected sqlite://{}/{{table}}/{SCHEMA_PATH}",
                        db.name()
                    ))
                }
                SchemaRequest::Table(table) => match db.table_columns(table) {
                    Ok(columns) => serde_json::to_string_pretty(&columns).map_err(|e| {
                        McpError::internal_error(format!("json error: {e}"), None)
                    })?,
                    Err(e) => {
                        tracing::warn!(table, error = %e, "failed to read table schema");
                        error_json(&format!("{e:#}"))
                    }
                },
            }
        };

        Ok(ReadResourceResult {
            contents: vec![text_contents(&uri, text, JSON_MIME)],
        })
    }
}
