use serde::Deserialize;

use crate::error::{Feed, WatchError};
use crate::notify::ThreadId;
use crate::transport::Transport;

/// Health of the build tree as of one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeState {
    pub is_open: bool,
    pub message: String,
    pub date: String,
    pub thread_id: Option<ThreadId>,
}

impl TreeState {
    /// Card status label.
    pub const fn label(&self) -> &'static str {
        if self.is_open { "Passing" } else { "Broken" }
    }
}

/// Status endpoint payload. Only the fields we use.
#[derive(Debug, Deserialize)]
struct RawTreeStatus {
    general_state: String,
    message: String,
    date: String,
}

/// Parse a tree status body.
pub fn parse_tree(body: &[u8]) -> Result<TreeState, WatchError> {
    let raw: RawTreeStatus =
        serde_json::from_slice(body).map_err(|e| WatchError::parse(Feed::Tree, e))?;
    Ok(TreeState {
        is_open: raw.general_state == "open",
        message: raw.message,
        date: raw.date,
        thread_id: None,
    })
}

/// Fetch and parse the current tree status.
pub fn fetch_tree(transport: &impl Transport, url: &str) -> Result<TreeState, WatchError> {
    let response = super::fetch(transport, Feed::Tree, url)?;
    parse_tree(&response.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    const OPEN: &str = r#"{
        "username": "sheriff@example.com",
        "general_state": "open",
        "message": "Tree is open",
        "date": "2023-04-01 10:00:00.000000",
        "can_commit_freely": true
    }"#;

    #[test]
    fn open_state_is_open() {
        let state = parse_tree(OPEN.as_bytes()).unwrap();
        assert!(state.is_open);
        assert_eq!(state.message, "Tree is open");
        assert_eq!(state.date, "2023-04-01 10:00:00.000000");
        assert_eq!(state.label(), "Passing");
        assert!(state.thread_id.is_none());
    }

    #[test]
    fn anything_but_open_is_closed() {
        for general in ["closed", "throttled", "maintenance", "Open"] {
            let body = format!(
                r#"{{"general_state": "{general}", "message": "m", "date": "d"}}"#
            );
            let state = parse_tree(body.as_bytes()).unwrap();
            assert!(!state.is_open, "{general} should not count as open");
            assert_eq!(state.label(), "Broken");
        }
    }

    #[test]
    fn missing_field_is_parse_error() {
        let err = parse_tree(br#"{"general_state": "open", "message": "m"}"#).unwrap_err();
        assert!(matches!(err, WatchError::Parse { feed: Feed::Tree, .. }));
        assert!(err.to_string().contains("date"));
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_tree(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, WatchError::Parse { .. }));
    }

    #[test]
    fn non_success_status_is_fetch_error() {
        let t = ScriptedTransport::new();
        t.push(503, "unavailable");
        let err = fetch_tree(&t, "https://status.example.com").unwrap_err();
        assert!(matches!(err, WatchError::Fetch { feed: Feed::Tree, .. }));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn fetch_parses_success_body() {
        let t = ScriptedTransport::new();
        t.push(200, OPEN);
        let state = fetch_tree(&t, "https://status.example.com").unwrap();
        assert!(state.is_open);
    }
}
