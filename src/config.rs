use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ExitError;

/// Config file name constants.
pub const CONFIG_TOML: &str = ".treewatch.toml";
pub const CONFIG_JSON: &str = ".treewatch.json";

/// Environment variable that overrides `chat.webhook_url`.
pub const CHAT_URL_ENV: &str = "TREEWATCH_CHAT_URL";

pub const DEFAULT_TREE_URL: &str = "https://v8-status.appspot.com/current?format=json";
pub const DEFAULT_TREE_LINK: &str = "http://v8-status.appspot.com/";
pub const DEFAULT_ROLL_URL: &str = "https://chromium-review.googlesource.com/changes/?q=owner:v8-ci-autoroll-builder@chops-service-accounts.iam.gserviceaccount.com+project:chromium/src&n=1&o=MESSAGES";
pub const DEFAULT_ROLL_LINK: &str = "https://chromium-review.googlesource.com/q/owner:v8-ci-autoroll-builder%2540chops-service-accounts.iam.gserviceaccount.com";

/// Find the config file in `dir`, preferring .treewatch.toml over .treewatch.json.
/// Returns None if neither exists.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    let toml_path = dir.join(CONFIG_TOML);
    if toml_path.exists() {
        return Some(toml_path);
    }
    let json_path = dir.join(CONFIG_JSON);
    if json_path.exists() {
        return Some(json_path);
    }
    None
}

/// The per-user config file, `<config_dir>/treewatch/config.toml`, if present.
fn user_config() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("treewatch").join("config.toml");
    path.exists().then_some(path)
}

/// Top-level treewatch config.
///
/// All structs use snake_case (TOML native) with `alias` attributes so
/// camelCase JSON configs load too.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub tree: TreeFeedConfig,
    #[serde(default)]
    pub roll: RollFeedConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ChatConfig {
    /// Incoming-webhook URL of the chat space. Required, either here or via
    /// `TREEWATCH_CHAT_URL`.
    #[serde(default, alias = "webhookUrl")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TreeFeedConfig {
    /// JSON status endpoint.
    #[serde(default = "default_tree_url")]
    pub url: String,
    /// Page linked from the card button.
    #[serde(default = "default_tree_link")]
    pub link: String,
}

impl Default for TreeFeedConfig {
    fn default() -> Self {
        Self {
            url: default_tree_url(),
            link: default_tree_link(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RollFeedConfig {
    /// Gerrit changes query returning the latest roll with its messages.
    #[serde(default = "default_roll_url")]
    pub url: String,
    /// Page linked from the card button.
    #[serde(default = "default_roll_link")]
    pub link: String,
    /// Bytes of non-JSON guard prefix to strip from the response body.
    #[serde(default = "default_guard_prefix_len", alias = "guardPrefixLen")]
    pub guard_prefix_len: usize,
}

impl Default for RollFeedConfig {
    fn default() -> Self {
        Self {
            url: default_roll_url(),
            link: default_roll_link(),
            guard_prefix_len: default_guard_prefix_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PollConfig {
    #[serde(default = "default_interval", alias = "intervalSecs")]
    pub interval_secs: u64,
    #[serde(default = "default_request_timeout", alias = "requestTimeoutSecs")]
    pub request_timeout_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NotifyConfig {
    /// Store the new state even when the webhook post fails. Off by default,
    /// so a failed announcement is retried on the next cycle.
    #[serde(default, alias = "advanceOnFailure")]
    pub advance_on_failure: bool,
}

// Default value functions for serde
fn default_tree_url() -> String { DEFAULT_TREE_URL.into() }
fn default_tree_link() -> String { DEFAULT_TREE_LINK.into() }
fn default_roll_url() -> String { DEFAULT_ROLL_URL.into() }
fn default_roll_link() -> String { DEFAULT_ROLL_LINK.into() }
const fn default_guard_prefix_len() -> usize { 4 }
const fn default_interval() -> u64 { 5 }
const fn default_request_timeout() -> u64 { 30 }

impl Config {
    /// Load config from a file (TOML or JSON, auto-detected by extension).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ExitError::Config(format!("reading {}: {e}", path.display())))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "toml" => Self::parse_toml(&contents),
            "json" => Self::parse_json(&contents),
            _ => Self::parse_toml(&contents).or_else(|_| Self::parse_json(&contents)),
        }
    }

    /// Parse config from a TOML string.
    pub fn parse_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| ExitError::Config(format!("invalid TOML config: {e}")).into())
    }

    /// Parse config from a JSON string.
    pub fn parse_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExitError::Config(format!("invalid JSON config: {e}")).into())
    }

    /// Locate, load, override and validate the config.
    ///
    /// Lookup order: the explicit path, then `.treewatch.toml` /
    /// `.treewatch.json` in `cwd`, then the per-user config file. With no file
    /// at all the defaults are used and only the webhook URL must come from the
    /// environment.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => find_config(cwd).or_else(user_config),
        };
        let mut config = match &path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Self::load(p)?
            }
            None => Self::default(),
        };
        config.apply_chat_url_override(std::env::var(CHAT_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replace the webhook URL with a non-empty override.
    pub fn apply_chat_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            self.chat.webhook_url = Some(url);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.webhook_url().is_none() {
            return Err(ExitError::Config(format!(
                "no chat webhook URL; set chat.webhook_url or {CHAT_URL_ENV}"
            ))
            .into());
        }
        if self.poll.interval_secs == 0 {
            return Err(ExitError::Config("poll.interval_secs must be at least 1".into()).into());
        }
        if self.poll.request_timeout_secs == 0 {
            return Err(
                ExitError::Config("poll.request_timeout_secs must be at least 1".into()).into(),
            );
        }
        Ok(())
    }

    /// The webhook URL, if set and non-empty.
    pub fn webhook_url(&self) -> Option<&str> {
        self.chat
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll.interval_secs)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.poll.request_timeout_secs)
    }
}
