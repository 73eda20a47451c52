//! MCP servers: one `ServerHandler` per adapted backend.
//!
//! Every tool returns pretty-printed JSON text. Failures are rendered as a
//! JSON `{ "error": ... }` body with `isError` set, so a bad call never tears
//! down the session.

use rmcp::ErrorData as McpError;
use rmcp::model::{AnnotateAble, RawResource, Resource, ResourceContents, ResourceTemplate};
use serde::Serialize;

pub mod masatora;
pub mod slack;
pub mod sqlite;

pub use masatora::MasatoraServer;
pub use slack::SlackServer;
pub use sqlite::SqliteServer;

pub(crate) const JSON_MIME: &str = "application/json";

// ---------------------------------------------------------------------------
// Tool output helpers
// ---------------------------------------------------------------------------

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("json error: {e}"))
}

/// `{ "error": message }`, pretty-printed.
pub fn error_json(message: &str) -> String {
    serde_json::to_string_pretty(&serde_json::json!({ "error": message }))
        .unwrap_or_else(|_| message.to_string())
}

/// Reject empty required string arguments. `fields` pairs each argument name
/// with its value.
pub fn require_args(fields: &[(&str, &str)]) -> Result<(), String> {
    if fields.iter().all(|(_, value)| !value.is_empty()) {
        return Ok(());
    }
    let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
    let message = match names.as_slice() {
        [single] => format!("Missing required argument: {single}"),
        _ => format!("Missing required arguments: {}", names.join(" and ")),
    };
    Err(error_json(&message))
}

// ---------------------------------------------------------------------------
// Resource helpers
// ---------------------------------------------------------------------------

pub(crate) fn resource(uri: &str, name: &str, description: Option<&str>, mime: &str) -> Resource {
    let mut raw = RawResource::new(uri, name);
    raw.description = description.map(str::to_string);
    raw.mime_type = Some(mime.to_string());
    raw.no_annotation()
}

pub(crate) fn resource_template(
    uri_template: &str,
    name: &str,
    description: &str,
    mime: &str,
) -> Result<ResourceTemplate, McpError> {
    serde_json::from_value(serde_json::json!({
        "uriTemplate": uri_template,
        "name": name,
        "description": description,
        "mimeType": mime,
    }))
    .map_err(|e| McpError::internal_error(format!("resource template error: {e}"), None))
}

/// Error for a resource URI the server does not serve. Shared by every server
/// so clients see one error code.
pub fn unknown_resource(uri: &str) -> McpError {
    McpError::invalid_params(format!("Unknown resource URI: {uri}"), None)
}

pub(crate) fn text_contents(uri: &str, text: String, mime: &str) -> ResourceContents {
    let mut contents = ResourceContents::text(text, uri);
    if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
        *mime_type = Some(mime.to_string());
    }
    contents
}
