//! Poll cycle: fetch each feed, compare with the last announced state, and
//! notify on transitions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Feed, WatchError};
use crate::feeds::{self, RollState, TreeState};
use crate::notify::{CardSpec, Notifier, ThreadId};
use crate::transport::Transport;

/// Last announced state per feed. Lives for the whole process, never on disk.
#[derive(Debug, Default)]
pub struct WatchState {
    pub tree: Option<TreeState>,
    pub roll: Option<RollState>,
}

/// Tree transitions: first observation, or open/closed flipped.
pub fn tree_changed(current: Option<&TreeState>, new: &TreeState) -> bool {
    current.is_none_or(|c| c.is_open != new.is_open)
}

/// Roll transitions: only conclusive states count, and only when the
/// outcome differs from the last announced one.
pub fn roll_changed(current: Option<&RollState>, new: &RollState) -> bool {
    new.status.is_some() && current.is_none_or(|c| c.status != new.status)
}

/// What a feed check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Same as the last announced state.
    Unchanged,
    /// Roll history had no conclusive message; cycle dropped.
    Inconclusive,
    /// A transition was announced and stored.
    Notified,
}

/// Feed locations and link targets, taken from the config.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub tree_url: String,
    pub tree_link: String,
    pub roll_url: String,
    pub roll_link: String,
    pub guard_prefix_len: usize,
}

impl From<&Config> for Endpoints {
    fn from(config: &Config) -> Self {
        Self {
            tree_url: config.tree.url.clone(),
            tree_link: config.tree.link.clone(),
            roll_url: config.roll.url.clone(),
            roll_link: config.roll.link.clone(),
            guard_prefix_len: config.roll.guard_prefix_len,
        }
    }
}

pub struct Watcher<F, N> {
    fetcher: F,
    notifier: Notifier<N>,
    endpoints: Endpoints,
    advance_on_failure: bool,
    state: WatchState,
}

impl<F: Transport, N: Transport> Watcher<F, N> {
    pub fn new(fetcher: F, notifier: Notifier<N>, endpoints: Endpoints) -> Self {
        Self {
            fetcher,
            notifier,
            endpoints,
            advance_on_failure: false,
            state: WatchState::default(),
        }
    }

    /// Store the new state even if posting its notification failed.
    #[must_use]
    pub fn advance_on_failure(mut self, advance: bool) -> Self {
        self.advance_on_failure = advance;
        self
    }

    pub const fn state(&self) -> &WatchState {
        &self.state
    }

    /// One full cycle: tree, then roll. Errors are logged per feed and never
    /// stop the other feed.
    pub fn tick(&mut self) {
        if let Err(e) = self.check_tree() {
            log_failure(&e);
        }
        if let Err(e) = self.check_roll() {
            log_failure(&e);
        }
    }

    pub fn check_tree(&mut self) -> Result<Outcome, WatchError> {
        let mut new = feeds::tree::fetch_tree(&self.fetcher, &self.endpoints.tree_url)?;
        let current = self.state.tree.as_ref();
        if !tree_changed(current, &new) {
            tracing::debug!(is_open = new.is_open, "tree unchanged");
            return Ok(Outcome::Unchanged);
        }
        tracing::info!(is_open = new.is_open, text = %new.message, "tree state changed");

        let previous_thread = current.and_then(|c| c.thread_id.clone());
        let spec = CardSpec {
            title: "Tree",
            status: new.label(),
            time: &new.date,
            message: &new.message,
            url_title: "TREE",
            link: &self.endpoints.tree_link,
            version: None,
        };
        let sent = self.notifier.send(Feed::Tree, &spec, previous_thread.as_ref());
        new.thread_id = self.settle(sent, previous_thread)?;
        self.state.tree = Some(new);
        Ok(Outcome::Notified)
    }

    pub fn check_roll(&mut self) -> Result<Outcome, WatchError> {
        let mut new = feeds::roll::fetch_roll(
            &self.fetcher,
            &self.endpoints.roll_url,
            self.endpoints.guard_prefix_len,
        )?;
        let Some(status) = new.status else {
            tracing::debug!("no conclusive roll message");
            return Ok(Outcome::Inconclusive);
        };
        let current = self.state.roll.as_ref();
        if !roll_changed(current, &new) {
            tracing::debug!(%status, "roll unchanged");
            return Ok(Outcome::Unchanged);
        }

        let version = new.version.as_deref().unwrap_or_default();
        let date = new.date.as_deref().unwrap_or_default();
        let message = new.message.as_deref().unwrap_or_default();
        tracing::info!("{status} {version} ({date}) : {message}");

        let previous_thread = current.and_then(|c| c.thread_id.clone());
        let spec = CardSpec {
            title: "Roll",
            status: status.as_str(),
            time: date,
            message,
            url_title: "CI",
            link: &self.endpoints.roll_link,
            version: new.version.as_deref(),
        };
        let sent = self.notifier.send(Feed::Roll, &spec, previous_thread.as_ref());
        new.thread_id = self.settle(sent, previous_thread)?;
        self.state.roll = Some(new);
        Ok(Outcome::Notified)
    }

    /// Decide the thread id to store after a send attempt, or propagate the
    /// failure when the state must not advance.
    fn settle(
        &self,
        sent: Result<Option<ThreadId>, WatchError>,
        previous_thread: Option<ThreadId>,
    ) -> Result<Option<ThreadId>, WatchError> {
        match sent {
            Ok(thread) => Ok(thread),
            Err(e) if self.advance_on_failure => {
                log_failure(&e);
                Ok(previous_thread)
            }
            Err(e) => Err(e),
        }
    }

    /// Tick every `interval` until `running` is cleared or `max_cycles`
    /// cycles have run (0 means no limit).
    pub fn run(&mut self, interval: Duration, running: &Arc<AtomicBool>, max_cycles: u64) {
        let mut cycle: u64 = 0;
        while running.load(Ordering::SeqCst) {
            cycle += 1;
            {
                let _span = tracing::info_span!("cycle", n = cycle).entered();
                self.tick();
            }
            if max_cycles != 0 && cycle >= max_cycles {
                break;
            }
            sleep_while_running(interval, running);
        }
        tracing::info!(cycles = cycle, "watch loop stopped");
    }
}

fn log_failure(e: &WatchError) {
    tracing::warn!(feed = %e.feed(), error = %e, "skipping feed this cycle");
}

/// Sleep for `interval`, waking early once `running` is cleared.
fn sleep_while_running(interval: Duration, running: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}
