use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stop after this many poll cycles (0 = run until interrupted)
    #[arg(long, default_value = "0")]
    pub max_cycles: u64,
}

impl RunArgs {
    pub fn execute(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        let config = super::load_config(config_path)?;
        let mut watcher = super::build_watcher(&config, false)?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::info!("interrupt received, finishing current cycle");
            flag.store(false, Ordering::SeqCst);
        }) {
            tracing::warn!("could not install Ctrl-C handler: {e}");
        }

        tracing::info!(
            interval_secs = config.poll.interval_secs,
            tree = %config.tree.url,
            roll = %config.roll.url,
            "watching feeds"
        );
        watcher.run(config.poll_interval(), &running, self.max_cycles);
        Ok(())
    }
}
