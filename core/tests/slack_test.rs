use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use courier_core::config::SlackConfig;
use courier_core::context::{ContextError, ContextResolver};
use courier_core::slack::SlackClient;

fn config(api_base: &str) -> SlackConfig {
    SlackConfig {
        bot_token: "xoxb-test".to_string(),
        team_id: "T0001".to_string(),
        api_base: api_base.to_string(),
        timeout_secs: 2,
    }
}

// ---------------------------------------------------------------------------
// Local stand-in for the Web API
// ---------------------------------------------------------------------------

/// One GET as the server saw it: method path plus decoded query pairs.
#[derive(Debug, Clone)]
struct Recorded {
    path: String,
    query: Vec<(String, String)>,
    authorization: Option<String>,
}

impl Recorded {
    fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Serves `bodies` in order (the last one repeats) with HTTP 200 and records
/// every request. Each connection answers one request and closes.
struct FakeSlack {
    api_base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeSlack {
    fn start(bodies: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let api_base = format!("http://{}/api", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        std::thread::spawn(move || {
            for (i, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut authorization = None;
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("authorization") {
                            authorization = Some(value.trim().to_string());
                        }
                    }
                }

                let target = request_line.split_whitespace().nth(1).unwrap_or_default();
                let (path, query) = target.split_once('?').unwrap_or((target, ""));
                recorded.lock().unwrap().push(Recorded {
                    path: path.to_string(),
                    query: decode_query(query),
                    authorization,
                });

                let body = &bodies[i.min(bodies.len() - 1)];
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
        });

        Self { api_base, requests }
    }

    fn client(&self) -> SlackClient {
        SlackClient::new(&config(&self.api_base))
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn decode_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(k), percent_decode(v))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap();
                out.push(u8::from_str_radix(hex, 16).unwrap());
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).unwrap()
}

fn history_body(timestamps: &[&str]) -> String {
    let messages: Vec<serde_json::Value> = timestamps
        .iter()
        .map(|ts| serde_json::json!({ "ts": ts, "text": format!("message {ts}") }))
        .collect();
    serde_json::json!({ "ok": true, "messages": messages }).to_string()
}

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

#[test]
fn test_method_url_trims_trailing_slash() {
    let client = SlackClient::new(&config("http://localhost:8080/api/"));
    assert_eq!(
        client.method_url("conversations.history"),
        "http://localhost:8080/api/conversations.history"
    );
}

#[test]
fn test_list_limits_are_capped() {
    let slack = FakeSlack::start(vec![r#"{"ok":true}"#.to_string()]);
    let client = slack.client();

    client.get_channels(Some(500), Some("dXNlcjpVMEc5V0ZYTlo=")).unwrap();
    client.get_users(Some(1000), None).unwrap();
    client.get_channels(None, None).unwrap();

    let requests = slack.requests();
    assert_eq!(requests.len(), 3);

    let channels = &requests[0];
    assert_eq!(channels.path, "/api/conversations.list");
    assert_eq!(channels.param("limit"), Some("200"));
    assert_eq!(channels.param("types"), Some("public_channel"));
    assert_eq!(channels.param("exclude_archived"), Some("true"));
    assert_eq!(channels.param("team_id"), Some("T0001"));
    assert_eq!(channels.param("cursor"), Some("dXNlcjpVMEc5V0ZYTlo="));
    assert_eq!(channels.authorization.as_deref(), Some("Bearer xoxb-test"));

    let users = &requests[1];
    assert_eq!(users.path, "/api/users.list");
    assert_eq!(users.param("limit"), Some("200"));
    assert_eq!(users.param("cursor"), None);

    assert_eq!(requests[2].param("limit"), Some("100"));
}

#[test]
fn test_search_caps_count_and_joins_channels() {
    let slack = FakeSlack::start(vec![r#"{"ok":true,"messages":{"matches":[]}}"#.to_string()]);
    let client = slack.client();

    let channels = vec!["C1".to_string(), "C2".to_string()];
    let no_channels: Vec<String> = Vec::new();
    client
        .search_messages("deploy failed", Some(channels.as_slice()), Some(250))
        .unwrap();
    client
        .search_messages("deploy", Some(no_channels.as_slice()), None)
        .unwrap();

    let requests = slack.requests();
    let search = &requests[0];
    assert_eq!(search.path, "/api/search.messages");
    assert_eq!(search.param("query"), Some("deploy failed"));
    assert_eq!(search.param("count"), Some("100"));
    assert_eq!(search.param("channel"), Some("C1,C2"));
    assert_eq!(search.param("sort"), Some("timestamp"));
    assert_eq!(search.param("sort_dir"), Some("desc"));

    let unfiltered = &requests[1];
    assert_eq!(unfiltered.param("count"), Some("20"));
    assert_eq!(unfiltered.param("channel"), None);
}

#[test]
fn test_passthrough_returns_raw_response() {
    let body = r#"{"ok":false,"error":"user_not_found"}"#;
    let slack = FakeSlack::start(vec![body.to_string()]);

    let response = slack.client().get_user_profile("U404").unwrap();
    assert_eq!(response, serde_json::json!({"ok": false, "error": "user_not_found"}));

    let request = &slack.requests()[0];
    assert_eq!(request.path, "/api/users.profile.get");
    assert_eq!(request.param("user"), Some("U404"));
    assert_eq!(request.param("include_labels"), Some("true"));
}

#[test]
fn test_invalid_json_is_decode_error() {
    let slack = FakeSlack::start(vec!["<html>gateway timeout</html>".to_string()]);
    let err = slack.client().get_channel_history("C1", None).unwrap_err();
    assert!(
        err.to_string()
            .starts_with("conversations.history returned invalid JSON"),
        "unexpected error: {err}"
    );
    assert_eq!(slack.requests()[0].param("limit"), Some("10"));
}

#[test]
fn test_passthrough_call_reports_transport_failure() {
    // port 9 (discard) is closed on test hosts, so the connection is refused
    let client = SlackClient::new(&config("http://127.0.0.1:9/api"));
    let err = client.get_user_profile("U1").unwrap_err();
    assert!(
        err.to_string().starts_with("users.profile.get request failed"),
        "unexpected error: {err}"
    );
}

// ---------------------------------------------------------------------------
// Context resolution over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_context_fetches_small_page_then_expanded_page() {
    let slack = FakeSlack::start(vec![
        history_body(&["3.0", "2.0"]),
        history_body(&["3.0", "2.0", "1.0"]),
    ]);
    let client = slack.client();

    let window = ContextResolver::new(&client)
        .resolve_context("C1", "1.0", 0)
        .await
        .unwrap();

    assert_eq!(window.messages.len(), 1);
    assert_eq!(window.messages[0].ts, "1.0");
    assert_eq!(window.messages[0].extra["text"], "message 1.0");

    let requests = slack.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.path, "/api/conversations.history");
        assert_eq!(request.param("channel"), Some("C1"));
    }
    assert_eq!(requests[0].param("limit"), Some("1"));
    assert_eq!(requests[1].param("limit"), Some("100"));
}

#[tokio::test]
async fn test_context_first_page_limit_is_twice_radius_plus_one() {
    let slack = FakeSlack::start(vec![history_body(&["5.0", "4.0", "3.0"])]);
    let client = slack.client();

    let window = ContextResolver::new(&client)
        .resolve_context("C1", "4.0", 3)
        .await
        .unwrap();

    assert_eq!(window.target_index, 1);
    let requests = slack.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].param("limit"), Some("7"));
}

#[tokio::test]
async fn test_ok_false_reply_is_upstream_error_verbatim() {
    let slack = FakeSlack::start(vec![r#"{"ok":false,"error":"channel_not_found"}"#.to_string()]);
    let client = slack.client();

    let err = ContextResolver::new(&client)
        .resolve_context("C404", "1.0", 5)
        .await
        .unwrap_err();

    assert_eq!(err, ContextError::Upstream("channel_not_found".to_string()));
    assert_eq!(slack.requests().len(), 1);
}

#[tokio::test]
async fn test_thread_context_requests_replies_and_parent_window() {
    let slack = FakeSlack::start(vec![history_body(&["9.0", "8.0", "7.0"])]);
    let client = slack.client();

    let thread = ContextResolver::new(&client)
        .resolve_thread_context("C1", "8.0")
        .await
        .unwrap();

    assert_eq!(thread.thread_messages.len(), 3);
    assert_eq!(thread.parent_context.target().unwrap().ts, "8.0");

    let requests = slack.requests();
    let replies = requests
        .iter()
        .find(|r| r.path == "/api/conversations.replies")
        .unwrap();
    assert_eq!(replies.param("channel"), Some("C1"));
    assert_eq!(replies.param("ts"), Some("8.0"));
    let history = requests
        .iter()
        .find(|r| r.path == "/api/conversations.history")
        .unwrap();
    assert_eq!(history.param("limit"), Some("5"));
}

#[tokio::test]
async fn test_unreachable_api_is_upstream_error() {
    let client = SlackClient::new(&config("http://127.0.0.1:9/api"));
    let err = ContextResolver::new(&client)
        .resolve_context("C1", "1.000001", 5)
        .await
        .unwrap_err();

    match err {
        ContextError::Upstream(message) => {
            assert!(message.contains("conversations.history"), "got: {message}")
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}
