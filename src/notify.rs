//! Chat cards and the webhook client that posts them.

use serde::{Deserialize, Serialize};

use crate::error::{Feed, WatchError};
use crate::transport::Transport;

/// Opaque thread handle returned by the chat webhook. It is echoed back
/// verbatim, whatever its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub serde_json::Value);

/// Everything needed to render one notification.
#[derive(Debug, Clone)]
pub struct CardSpec<'a> {
    pub title: &'a str,
    pub status: &'a str,
    pub time: &'a str,
    pub message: &'a str,
    pub url_title: &'a str,
    pub link: &'a str,
    pub version: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub header: CardHeader,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardHeader {
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub widgets: Vec<Widget>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Widget {
    KeyValue {
        #[serde(rename = "topLabel")]
        top_label: String,
        content: String,
    },
    TextParagraph {
        text: String,
    },
    Buttons(Vec<Button>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Button {
    TextButton {
        text: String,
        #[serde(rename = "onClick")]
        on_click: OnClick,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnClick {
    pub open_link: OpenLink,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpenLink {
    pub url: String,
}

fn key_value(label: &str, content: &str) -> Widget {
    Widget::KeyValue {
        top_label: label.to_string(),
        content: content.to_string(),
    }
}

impl Card {
    pub fn build(spec: &CardSpec<'_>) -> Self {
        let mut facts = vec![key_value("Status", spec.status), key_value("Time", spec.time)];
        if let Some(version) = spec.version {
            facts.push(key_value("Version", version));
        }

        let button = Button::TextButton {
            text: format!("OPEN {}", spec.url_title),
            on_click: OnClick {
                open_link: OpenLink {
                    url: spec.link.to_string(),
                },
            },
        };

        Self {
            header: CardHeader {
                title: spec.title.to_string(),
            },
            sections: vec![
                Section {
                    header: None,
                    widgets: facts,
                },
                Section {
                    header: Some("Message".to_string()),
                    widgets: vec![Widget::TextParagraph {
                        text: spec.message.to_string(),
                    }],
                },
                Section {
                    header: None,
                    widgets: vec![Widget::Buttons(vec![button])],
                },
            ],
        }
    }
}

/// Body posted to the webhook.
#[derive(Debug, Serialize)]
pub struct WebhookMessage<'a> {
    pub cards: Vec<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<&'a ThreadId>,
}

#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    thread: Option<ThreadId>,
}

/// Posts cards to the chat webhook.
pub struct Notifier<T> {
    transport: T,
    webhook_url: String,
    dry_run: bool,
}

impl<T: Transport> Notifier<T> {
    pub fn new(transport: T, webhook_url: impl Into<String>) -> Self {
        Self {
            transport,
            webhook_url: webhook_url.into(),
            dry_run: false,
        }
    }

    /// Print payloads to stdout instead of posting them.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Send one card for `feed`, as a reply in `thread` when given.
    ///
    /// Returns whatever thread the webhook reports; that becomes the thread
    /// for the next notification on this feed.
    pub fn send(
        &self,
        feed: Feed,
        spec: &CardSpec<'_>,
        thread: Option<&ThreadId>,
    ) -> Result<Option<ThreadId>, WatchError> {
        let message = WebhookMessage {
            cards: vec![Card::build(spec)],
            thread,
        };

        if self.dry_run {
            let json = serde_json::to_string_pretty(&message)
                .map_err(|e| WatchError::notify(feed, e))?;
            println!("{json}");
            return Ok(None);
        }

        let body = serde_json::to_vec(&message).map_err(|e| WatchError::notify(feed, e))?;
        let response = self
            .transport
            .post_json(&self.webhook_url, &body)
            .map_err(|e| WatchError::notify(feed, e))?;
        if !response.success() {
            return Err(WatchError::notify(
                feed,
                format!("webhook returned status {}: {}", response.status, response.text().trim()),
            ));
        }

        let reply: WebhookReply = serde_json::from_slice(&response.body)
            .map_err(|e| WatchError::notify(feed, format!("malformed webhook response: {e}")))?;
        tracing::debug!(%feed, threaded = thread.is_some(), "notification posted");
        Ok(reply.thread)
    }
}
