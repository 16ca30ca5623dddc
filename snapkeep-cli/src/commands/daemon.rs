//! `snapkeep daemon`: run the socket server in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use snapkeep_daemon::start_blocking;

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Default root for backup sets that do not name their own.
    #[arg(long, short = 'p', value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,
}

impl DaemonArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let mut settings = global.settings()?;
        if let Some(dir) = self.backup_dir {
            settings.backup_dir = dir;
        }
        settings.validate().context("invalid daemon settings")?;
        start_blocking(settings).context("daemon exited with error")?;
        Ok(())
    }
}
