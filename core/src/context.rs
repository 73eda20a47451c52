use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single chat message. Only the timestamp is interpreted; every other field
/// (author, text, attachments, reactions) is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// `<seconds>.<microseconds>` identifier, unique within a channel.
    #[serde(default)]
    pub ts: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    pub fn new(ts: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// One page returned by a history or thread-replies fetch, mirroring the
/// `{ ok, messages, error }` envelope of the chat API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryPage {
    pub ok: bool,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub error: Option<String>,
}

impl HistoryPage {
    pub fn success(messages: Vec<Message>) -> Self {
        Self {
            ok: true,
            messages,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            messages: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Unwrap the envelope, turning `ok: false` into an upstream error.
    fn into_messages(self) -> Result<Vec<Message>, ContextError> {
        if self.ok {
            Ok(self.messages)
        } else {
            Err(ContextError::Upstream(
                self.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

/// Messages surrounding a target, in the page's native (newest-first) order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextWindow {
    pub messages: Vec<Message>,
    /// Position of the target inside `messages`.
    pub target_index: usize,
}

impl ContextWindow {
    pub fn target(&self) -> Option<&Message> {
        self.messages.get(self.target_index)
    }
}

/// A thread's replies together with the channel context of its root message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadContext {
    /// Full reply list, root first.
    pub thread_messages: Vec<Message>,
    pub parent_context: ContextWindow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The history provider reported a failure. Carries its message verbatim.
    #[error("{0}")]
    Upstream(String),
    #[error("Message with timestamp {timestamp} not found in channel {channel}")]
    NotFound { channel: String, timestamp: String },
}

impl ContextError {
    /// Stable machine-readable tag for rendering at the protocol layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Upstream(_) => "upstream_error",
            Self::NotFound { .. } => "not_found",
        }
    }
}

// ---------------------------------------------------------------------------
// HistorySource — the remote chat history provider
// ---------------------------------------------------------------------------

/// Capability contract for the chat-history provider.
///
/// `fetch_history` must return messages most-recent-first: the window
/// arithmetic in [`find_window`] treats lower indices as newer messages.
/// `fetch_thread_replies` returns the root message first, then its replies.
///
/// An `Err` means the call itself failed (transport, decoding); a page with
/// `ok: false` means the provider answered with an error.
pub trait HistorySource: Send + Sync {
    fn fetch_history(
        &self,
        channel: &str,
        limit: usize,
    ) -> impl Future<Output = anyhow::Result<HistoryPage>> + Send;

    fn fetch_thread_replies(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> impl Future<Output = anyhow::Result<HistoryPage>> + Send;
}

// ---------------------------------------------------------------------------
// Windowing
// ---------------------------------------------------------------------------

/// Default number of messages on each side of the target.
pub const DEFAULT_RADIUS: usize = 5;

/// Radius used for the root message when resolving a thread.
pub const THREAD_PARENT_RADIUS: usize = 2;

/// Page size of the second, wider history fetch.
pub const EXPANDED_PAGE_SIZE: usize = 100;

/// Locate `target_ts` in `messages` and cut a window of up to `radius`
/// messages on each side, clamped to the page boundaries.
///
/// Returns `None` when the target is not in the page. Duplicate timestamps
/// resolve to the first match.
pub fn find_window(
    mut messages: Vec<Message>,
    target_ts: &str,
    radius: usize,
) -> Option<ContextWindow> {
    let index = messages.iter().position(|m| m.ts == target_ts)?;
    let start = index.saturating_sub(radius);
    let end = index.saturating_add(radius).min(messages.len() - 1);

    messages.truncate(end + 1);
    let window = messages.split_off(start);

    Some(ContextWindow {
        messages: window,
        target_index: index - start,
    })
}

// ---------------------------------------------------------------------------
// ContextResolver — two-phase window search and thread merge
// ---------------------------------------------------------------------------

pub struct ContextResolver<'a, S> {
    source: &'a S,
}

impl<'a, S: HistorySource> ContextResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Resolve the window of `radius` messages around `target_ts`.
    ///
    /// Fetches `2 * radius + 1` recent messages first; on a miss, fetches
    /// [`EXPANDED_PAGE_SIZE`] and searches again. Never issues more than two
    /// history calls, and phase results are not merged.
    pub async fn resolve_context(
        &self,
        channel: &str,
        target_ts: &str,
        radius: usize,
    ) -> Result<ContextWindow, ContextError> {
        let first_page_size = radius.saturating_mul(2).saturating_add(1);

        for limit in [first_page_size, EXPANDED_PAGE_SIZE] {
            let messages = self.history(channel, limit).await?;
            if let Some(window) = find_window(messages, target_ts, radius) {
                tracing::debug!(
                    channel,
                    target_ts,
                    limit,
                    window_len = window.messages.len(),
                    "resolved message context"
                );
                return Ok(window);
            }
            tracing::debug!(channel, target_ts, limit, "target not in history page");
        }

        Err(ContextError::NotFound {
            channel: channel.to_string(),
            timestamp: target_ts.to_string(),
        })
    }

    /// Fetch a thread's replies and the context around its root message.
    ///
    /// Both lookups run concurrently; if either fails the whole call fails.
    pub async fn resolve_thread_context(
        &self,
        channel: &str,
        thread_ts: &str,
    ) -> Result<ThreadContext, ContextError> {
        let replies = async {
            let page = self
                .source
                .fetch_thread_replies(channel, thread_ts)
                .await
                .map_err(|e| ContextError::Upstream(format!("{e:#}")))?;
            page.into_messages()
        };
        let parent = self.resolve_context(channel, thread_ts, THREAD_PARENT_RADIUS);

        let (thread_messages, parent_context) = tokio::try_join!(replies, parent)?;

        Ok(ThreadContext {
            thread_messages,
            parent_context,
        })
    }

    async fn history(&self, channel: &str, limit: usize) -> Result<Vec<Message>, ContextError> {
        let page = self
            .source
            .fetch_history(channel, limit)
            .await
            .map_err(|e| ContextError::Upstream(format!("{e:#}")))?;
        page.into_messages()
    }
}
