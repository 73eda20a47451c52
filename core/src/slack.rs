use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::SlackConfig;
use crate::context::{HistoryPage, HistorySource};

/// Upper bound Slack accepts for `conversations.list` / `users.list` pages.
const MAX_LIST_LIMIT: u32 = 200;
/// Upper bound for `search.messages` result counts.
const MAX_SEARCH_COUNT: u32 = 100;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: ureq::Error,
    },
    #[error("{method} returned invalid JSON: {source}")]
    Decode {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// SlackClient — thin blocking wrapper over the Slack Web API
// ---------------------------------------------------------------------------

/// Bot-token client for the handful of read-only Web API methods the server
/// exposes. Responses are returned as raw JSON; Slack reports application
/// errors in-band as `{ "ok": false, "error": "..." }`.
#[derive(Clone)]
pub struct SlackClient {
    agent: ureq::Agent,
    api_base: String,
    auth_header: String,
    team_id: String,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {}", config.bot_token),
            team_id: config.team_id.clone(),
        }
    }

    /// Build the full endpoint URL for a Web API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        tracing::debug!(method, params = params.len(), "calling slack api");

        let mut request = self
            .agent
            .get(self.method_url(method))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json");
        for (key, value) in params {
            request = request.query(*key, value);
        }

        let mut response = request
            .call()
            .map_err(|source| SlackError::Http { method, source })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|source| SlackError::Http { method, source })?;

        serde_json::from_str(&body).map_err(|source| SlackError::Decode { method, source })
    }

    pub fn get_channels(&self, limit: Option<u32>, cursor: Option<&str>) -> Result<Value, SlackError> {
        let mut params = vec![
            ("types", "public_channel".to_string()),
            ("exclude_archived", "true".to_string()),
            ("limit", limit.unwrap_or(100).min(MAX_LIST_LIMIT).to_string()),
            ("team_id", self.team_id.clone()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.call("conversations.list", &params)
    }

    pub fn get_channel_history(&self, channel_id: &str, limit: Option<u32>) -> Result<Value, SlackError> {
        self.history(channel_id, limit.map_or(10, |l| l as usize))
    }

    pub fn get_thread_replies(&self, channel_id: &str, thread_ts: &str) -> Result<Value, SlackError> {
        self.replies(channel_id, thread_ts)
    }

    pub fn get_users(&self, limit: Option<u32>, cursor: Option<&str>) -> Result<Value, SlackError> {
        let mut params = vec![
            ("limit", limit.unwrap_or(100).min(MAX_LIST_LIMIT).to_string()),
            ("team_id", self.team_id.clone()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        self.call("users.list", &params)
    }

    pub fn get_user_profile(&self, user_id: &str) -> Result<Value, SlackError> {
        self.call(
            "users.profile.get",
            &[("user", user_id.to_string()), ("include_labels", "true".to_string())],
        )
    }

    pub fn search_messages(
        &self,
        query: &str,
        channels: Option<&[String]>,
        limit: Option<u32>,
    ) -> Result<Value, SlackError> {
        let mut params = vec![
            ("query", query.to_string()),
            ("count", limit.unwrap_or(20).min(MAX_SEARCH_COUNT).to_string()),
            ("sort", "timestamp".to_string()),
            ("sort_dir", "desc".to_string()),
        ];
        if let Some(channels) = channels.filter(|c| !c.is_empty()) {
            params.push(("channel", channels.join(",")));
        }
        self.call("search.messages", &params)
    }

    // Shared by the raw tool calls (`Value`) and the context resolver (`HistoryPage`).
    fn history<T: DeserializeOwned>(&self, channel_id: &str, limit: usize) -> Result<T, SlackError> {
        self.call(
            "conversations.history",
            &[("channel", channel_id.to_string()), ("limit", limit.to_string())],
        )
    }

    fn replies<T: DeserializeOwned>(&self, channel_id: &str, thread_ts: &str) -> Result<T, SlackError> {
        self.call(
            "conversations.replies",
            &[("channel", channel_id.to_string()), ("ts", thread_ts.to_string())],
        )
    }
}

// ureq is blocking; each fetch runs on tokio's blocking pool so the two
// thread-context lookups can overlap.
impl HistorySource for SlackClient {
    async fn fetch_history(&self, channel: &str, limit: usize) -> anyhow::Result<HistoryPage> {
        let client = self.clone();
        let channel = channel.to_string();
        let page =
            tokio::task::spawn_blocking(move || client.history::<HistoryPage>(&channel, limit))
                .await??;
        Ok(page)
    }

    async fn fetch_thread_replies(&self, channel: &str, thread_ts: &str) -> anyhow::Result<HistoryPage> {
        let client = self.clone();
        let channel = channel.to_string();
        let thread_ts = thread_ts.to_string();
        let page =
            tokio::task::spawn_blocking(move || client.replies::<HistoryPage>(&channel, &thread_ts))
                .await??;
        Ok(page)
    }
}
