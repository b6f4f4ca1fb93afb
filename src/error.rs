use std::fmt;
use std::process::ExitCode;

/// Errors that cause treewatch to exit with a specific code.
#[derive(Debug, thiserror::Error)]
pub enum ExitError {
    #[error("config error: {0}")]
    Config(String),
}

impl ExitError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::from(2),
        }
    }
}

/// The two watched feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Tree,
    Roll,
}

impl Feed {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Roll => "roll",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures inside a single poll cycle. None of these are fatal: the loop
/// logs them and moves on to the other feed.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("fetching {feed} feed failed: {reason}")]
    Fetch { feed: Feed, reason: String },

    #[error("could not parse {feed} feed: {reason}")]
    Parse { feed: Feed, reason: String },

    #[error("posting {feed} notification failed: {reason}")]
    Notify { feed: Feed, reason: String },
}

impl WatchError {
    pub fn fetch(feed: Feed, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            feed,
            reason: reason.to_string(),
        }
    }

    pub fn parse(feed: Feed, reason: impl fmt::Display) -> Self {
        Self::Parse {
            feed,
            reason: reason.to_string(),
        }
    }

    pub fn notify(feed: Feed, reason: impl fmt::Display) -> Self {
        Self::Notify {
            feed,
            reason: reason.to_string(),
        }
    }

    pub const fn feed(&self) -> Feed {
        match self {
            Self::Fetch { feed, .. } | Self::Parse { feed, .. } | Self::Notify { feed, .. } => {
                *feed
            }
        }
    }
}
