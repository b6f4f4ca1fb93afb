pub mod check;
pub mod run;
pub mod schema;

use std::path::Path;

use anyhow::Context;

use crate::config::Config;
use crate::notify::Notifier;
use crate::transport::UreqTransport;
use crate::watch::{Endpoints, Watcher};

/// Resolve the config relative to the current directory.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Config::resolve(explicit, &cwd)
}

/// Build a watcher talking to the real feeds and webhook.
pub fn build_watcher(
    config: &Config,
    dry_run: bool,
) -> anyhow::Result<Watcher<UreqTransport, UreqTransport>> {
    let webhook = config
        .webhook_url()
        .context("chat webhook URL missing after validation")?;
    let transport = UreqTransport::new(config.request_timeout());
    let notifier = Notifier::new(transport.clone(), webhook).dry_run(dry_run);
    Ok(Watcher::new(transport, notifier, Endpoints::from(config))
        .advance_on_failure(config.notify.advance_on_failure))
}
