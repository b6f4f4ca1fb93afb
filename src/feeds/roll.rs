//! Roll outcome extraction from Gerrit review history.
//!
//! The latest roll change's messages are scanned newest first and the first
//! classifiable one decides the outcome. Classification is a fixed, ordered
//! table of rules ([`RULES`]) so precedence can be read and tested without
//! any I/O.

use std::fmt;

use serde::Deserialize;

use crate::error::{Feed, WatchError};
use crate::notify::ThreadId;
use crate::transport::Transport;

/// Guard prefix Gerrit prepends to every JSON response.
pub const GERRIT_GUARD: &[u8] = b")]}'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollStatus {
    Merged,
    Failed,
}

impl RollStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merged => "Merged",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for RollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent roll as of one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollState {
    /// `None` when no message in the history was conclusive.
    pub status: Option<RollStatus>,
    pub message: Option<String>,
    pub date: Option<String>,
    pub version: Option<String>,
    pub thread_id: Option<ThreadId>,
}

/// One entry of a change's `messages` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewMessage {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChange {
    subject: String,
    #[serde(default)]
    messages: Vec<ReviewMessage>,
}

/// What a single message tells the scan to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not informative; keep looking at older messages.
    Skip,
    /// The roll is still in flight or was superseded; no outcome.
    Stop,
    /// Terminal outcome taken from this message.
    Classify(RollStatus),
}

pub struct Rule {
    pub name: &'static str,
    matches: fn(tag: &str, text: &str) -> bool,
    pub verdict: Verdict,
}

/// Evaluated top to bottom; the first match wins. A message matching none of
/// them is a failure.
pub const RULES: &[Rule] = &[
    Rule {
        name: "cq-trying",
        matches: |_, text| text.contains("CQ is trying the patch"),
        verdict: Verdict::Skip,
    },
    Rule {
        name: "dry-run-passed",
        matches: |_, text| text.contains("This CL passed the CQ dry run"),
        verdict: Verdict::Stop,
    },
    Rule {
        name: "new-patch-set",
        matches: |tag, _| tag.contains("autogenerated:gerrit:newPatchSet"),
        verdict: Verdict::Stop,
    },
    Rule {
        name: "merged",
        matches: |tag, _| tag.contains("autogenerated:gerrit:merged"),
        verdict: Verdict::Classify(RollStatus::Merged),
    },
    Rule {
        name: "cq-unset",
        matches: |_, text| text.contains("-Commit-Queue"),
        verdict: Verdict::Stop,
    },
    Rule {
        name: "abandoned",
        matches: |tag, _| tag.contains("abandon"),
        verdict: Verdict::Stop,
    },
];

const FALLBACK: (&str, Verdict) = ("fallback", Verdict::Classify(RollStatus::Failed));

/// Classify one message. Returns `None` for messages lacking a tag or text:
/// untagged entries are human comments and say nothing about the roll.
pub fn classify(msg: &ReviewMessage) -> Option<(&'static str, Verdict)> {
    let (Some(tag), Some(text)) = (msg.tag.as_deref(), msg.message.as_deref()) else {
        return None;
    };
    let hit = RULES
        .iter()
        .find(|rule| (rule.matches)(tag, text))
        .map_or(FALLBACK, |rule| (rule.name, rule.verdict));
    Some(hit)
}

/// Scan `messages` (oldest first) from the newest end and build the state.
pub fn scan_messages(messages: &[ReviewMessage]) -> RollState {
    let mut state = RollState::default();
    for msg in messages.iter().rev() {
        let Some((rule, verdict)) = classify(msg) else {
            tracing::debug!(date = ?msg.date, "skipping roll message missing tag or text");
            continue;
        };
        tracing::trace!(rule, ?verdict, "classified roll message");
        match verdict {
            Verdict::Skip => {}
            Verdict::Stop => break,
            Verdict::Classify(status) => {
                state.status = Some(status);
                state.message.clone_from(&msg.message);
                state.date.clone_from(&msg.date);
                break;
            }
        }
    }
    state
}

/// Version from a roll subject like `Update V8 to 11.2.3.4.`: the last
/// whitespace-separated token without its final character.
pub fn parse_version(subject: &str) -> Option<String> {
    let mut token = subject.split_whitespace().last()?.to_string();
    token.pop();
    (!token.is_empty()).then_some(token)
}

/// Strip `prefix_len` guard bytes from a Gerrit response body.
pub fn strip_guard(body: &[u8], prefix_len: usize) -> Result<&[u8], WatchError> {
    if body.len() < prefix_len {
        return Err(WatchError::parse(
            Feed::Roll,
            format!("body shorter than {prefix_len}-byte guard prefix"),
        ));
    }
    if !body.starts_with(GERRIT_GUARD) {
        tracing::warn!(
            prefix_len,
            "roll response does not start with the Gerrit guard; stripping anyway"
        );
    }
    Ok(&body[prefix_len..])
}

/// Parse a roll-history body (guard prefix included).
pub fn parse_roll(body: &[u8], prefix_len: usize) -> Result<RollState, WatchError> {
    let json = strip_guard(body, prefix_len)?;
    let changes: Vec<RawChange> =
        serde_json::from_slice(json).map_err(|e| WatchError::parse(Feed::Roll, e))?;
    let change = changes
        .into_iter()
        .next()
        .ok_or_else(|| WatchError::parse(Feed::Roll, "query returned no changes"))?;

    let mut state = scan_messages(&change.messages);
    state.version = parse_version(&change.subject);
    Ok(state)
}

/// Fetch and parse the latest roll.
pub fn fetch_roll(
    transport: &impl Transport,
    url: &str,
    prefix_len: usize,
) -> Result<RollState, WatchError> {
    let response = super::fetch(transport, Feed::Roll, url)?;
    parse_roll(&response.body, prefix_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;

    fn msg(tag: Option<&str>, text: Option<&str>, date: &str) -> ReviewMessage {
        ReviewMessage {
            tag: tag.map(Into::into),
            message: text.map(Into::into),
            date: Some(date.into()),
        }
    }

    fn text(t: &str, date: &str) -> ReviewMessage {
        msg(Some("autogenerated:cq:full-run"), Some(t), date)
    }

    #[test]
    fn merged_tag_sets_merged_with_that_message() {
        let messages = vec![
            msg(Some("autogenerated:gerrit:newPatchSet"), Some("Uploaded patch set 1."), "d1"),
            text("CQ is trying the patch.", "d2"),
            msg(
                Some("autogenerated:gerrit:merged"),
                Some("Change has been successfully merged"),
                "d3",
            ),
        ];
        let state = scan_messages(&messages);
        assert_eq!(state.status, Some(RollStatus::Merged));
        assert_eq!(state.message.as_deref(), Some("Change has been successfully merged"));
        assert_eq!(state.date.as_deref(), Some("d3"));
    }

    #[test]
    fn dry_run_pass_discards_regardless_of_history() {
        let messages = vec![
            msg(Some("autogenerated:gerrit:merged"), Some("merged"), "d1"),
            text("Try jobs failed on following builders", "d2"),
            text("Dry run: This CL passed the CQ dry run.", "d3"),
        ];
        let state = scan_messages(&messages);
        assert_eq!(state.status, None);
        assert_eq!(state.message, None);
        assert_eq!(state.date, None);
    }

    #[test]
    fn new_patch_set_after_cq_attempt_discards() {
        let messages = vec![
            msg(None, Some("CQ is trying the patch"), "d1"),
            msg(Some("autogenerated:gerrit:newPatchSet"), None, "d2"),
        ];
        assert_eq!(scan_messages(&messages).status, None);
    }

    #[test]
    fn cq_trying_is_skipped_to_reach_older_outcome() {
        let messages = vec![
            text("Failed builds: linux-rel", "d1"),
            text("CQ is trying the patch.", "d2"),
            text("CQ is trying the patch again.", "d3"),
        ];
        let state = scan_messages(&messages);
        assert_eq!(state.status, Some(RollStatus::Failed));
        assert_eq!(state.date.as_deref(), Some("d1"));
    }

    #[test]
    fn unrecognised_message_is_failure() {
        let state = scan_messages(&[text("Try jobs failed on following builders: x", "d9")]);
        assert_eq!(state.status, Some(RollStatus::Failed));
        assert_eq!(
            state.message.as_deref(),
            Some("Try jobs failed on following builders: x")
        );
    }

    #[test]
    fn commit_queue_removal_and_abandon_stop() {
        let cq_removed = [
            text("Failed", "d1"),
            text("Patch Set 1: -Commit-Queue", "d2"),
        ];
        assert_eq!(scan_messages(&cq_removed).status, None);

        let abandoned = [
            text("Failed", "d1"),
            msg(Some("autogenerated:gerrit:abandon"), Some("Abandoned"), "d2"),
        ];
        assert_eq!(scan_messages(&abandoned).status, None);
    }

    #[test]
    fn rule_order_wins_over_later_rules() {
        // Both merged tag and "-Commit-Queue" text: merged comes first.
        let both = msg(
            Some("autogenerated:gerrit:merged"),
            Some("Patch Set 2: -Commit-Queue"),
            "d",
        );
        assert_eq!(
            classify(&both),
            Some(("merged", Verdict::Classify(RollStatus::Merged)))
        );

        // Dry-run text beats a new-patch-set tag.
        let dry = msg(
            Some("autogenerated:gerrit:newPatchSet"),
            Some("This CL passed the CQ dry run."),
            "d",
        );
        assert_eq!(classify(&dry), Some(("dry-run-passed", Verdict::Stop)));
    }

    #[test]
    fn messages_without_tag_or_text_are_noise() {
        assert_eq!(classify(&msg(None, None, "d")), None);

        let messages = vec![
            msg(Some("autogenerated:gerrit:merged"), Some("merged"), "d1"),
            msg(None, None, "d2"),
        ];
        let state = scan_messages(&messages);
        assert_eq!(state.status, Some(RollStatus::Merged));
        assert_eq!(state.date.as_deref(), Some("d1"));
    }

    #[test]
    fn human_comment_after_merge_is_ignored() {
        let messages = vec![
            msg(
                Some("autogenerated:gerrit:merged"),
                Some("Change has been successfully merged"),
                "d1",
            ),
            msg(None, Some("Thanks, looks good"), "d2"),
        ];
        assert_eq!(classify(&messages[1]), None);
        let state = scan_messages(&messages);
        assert_eq!(state.status, Some(RollStatus::Merged));
        assert_eq!(
            state.message.as_deref(),
            Some("Change has been successfully merged")
        );
        assert_eq!(state.date.as_deref(), Some("d1"));
    }

    #[test]
    fn tag_without_text_is_ignored() {
        assert_eq!(classify(&msg(Some("autogenerated:gerrit:merged"), None, "d")), None);
        let messages = vec![
            text("Failed builds: linux-rel", "d1"),
            msg(Some("autogenerated:gerrit:abandon"), None, "d2"),
        ];
        assert_eq!(scan_messages(&messages).status, Some(RollStatus::Failed));
    }

    #[test]
    fn empty_history_has_no_status() {
        assert_eq!(scan_messages(&[]), RollState::default());
    }

    #[test]
    fn version_from_subject() {
        assert_eq!(
            parse_version("Update V8 to 11.2.3.4.").as_deref(),
            Some("11.2.3.4")
        );
        assert_eq!(parse_version("Update V8 to  9.0.1.\n").as_deref(), Some("9.0.1"));
        assert_eq!(parse_version("   "), None);
        assert_eq!(parse_version("Update V8 to ."), None);
    }

    const BODY: &str = r#")]}'
[
  {
    "id": "chromium%2Fsrc~main~I1234",
    "subject": "Update V8 to 11.2.3.4.",
    "status": "MERGED",
    "messages": [
      {"id": "a", "tag": "autogenerated:gerrit:newPatchSet", "message": "Uploaded patch set 1.", "date": "2023-04-01 10:00:00.000000000"},
      {"id": "b", "tag": "autogenerated:cq:full-run", "message": "CQ is trying the patch.", "date": "2023-04-01 10:01:00.000000000"},
      {"id": "c", "tag": "autogenerated:gerrit:merged", "message": "Change has been successfully merged", "date": "2023-04-01 11:00:00.000000000"}
    ]
  }
]
"#;

    #[test]
    fn parse_full_gerrit_body() {
        let state = parse_roll(BODY.as_bytes(), 4).unwrap();
        assert_eq!(state.status, Some(RollStatus::Merged));
        assert_eq!(state.version.as_deref(), Some("11.2.3.4"));
        assert_eq!(state.date.as_deref(), Some("2023-04-01 11:00:00.000000000"));
        assert!(state.thread_id.is_none());
    }

    #[test]
    fn wrong_prefix_length_is_parse_error() {
        let err = parse_roll(BODY.as_bytes(), 2).unwrap_err();
        assert!(matches!(err, WatchError::Parse { feed: Feed::Roll, .. }));
    }

    #[test]
    fn unexpected_guard_is_still_stripped() {
        let state = parse_roll(b"XXXX\n[{\"subject\":\"a b.\",\"messages\":[]}]", 4).unwrap();
        assert_eq!(state.status, None);
        assert_eq!(state.version.as_deref(), Some("b"));
    }

    #[test]
    fn non_array_document_is_parse_error() {
        let err = parse_roll(b")]}'\n{\"subject\":\"x\"}", 4).unwrap_err();
        assert!(matches!(err, WatchError::Parse { feed: Feed::Roll, .. }));
    }

    #[test]
    fn short_body_is_parse_error() {
        let err = parse_roll(b")]", 4).unwrap_err();
        assert!(err.to_string().contains("guard prefix"));
    }

    #[test]
    fn empty_result_is_parse_error() {
        let err = parse_roll(b")]}'\n[]\n", 4).unwrap_err();
        assert!(err.to_string().contains("no changes"));
    }

    #[test]
    fn fetch_rejects_error_status() {
        let t = ScriptedTransport::new();
        t.push(500, "Internal Server Error");
        let err = fetch_roll(&t, "https://review.example.com/changes/", 4).unwrap_err();
        assert!(matches!(err, WatchError::Fetch { feed: Feed::Roll, .. }));
    }
}
