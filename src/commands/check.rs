use std::path::Path;

use clap::Args;

use crate::watch::Outcome;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print card payloads instead of posting them
    #[arg(long)]
    pub dry_run: bool,
}

impl CheckArgs {
    /// Run a single cycle from a blank state, so any conclusive state is
    /// announced. Fails if either feed could not be processed.
    pub fn execute(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        let config = super::load_config(config_path)?;
        let mut watcher = super::build_watcher(&config, self.dry_run)?;

        let results = [watcher.check_tree(), watcher.check_roll()];
        let mut failed = 0;
        for result in results {
            match result {
                Ok(Outcome::Inconclusive) => eprintln!("roll: no conclusive message, nothing sent"),
                Ok(outcome) => tracing::debug!(?outcome, "feed checked"),
                Err(e) => {
                    eprintln!("error: {e}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{failed} feed(s) failed");
        }
        Ok(())
    }
}
