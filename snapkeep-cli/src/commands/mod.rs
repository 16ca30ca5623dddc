//! Subcommands and the flags they share.

pub mod daemon;
pub mod init;
pub mod lastrun;
pub mod rotate;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use snapkeep_core::{BackupSetConfig, Settings};
use snapkeep_daemon::Client;

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Daemon socket path (overrides the settings file).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// YAML settings file.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for the daemon's answer.
    #[arg(long, global = true, default_value_t = 10, value_name = "SECS")]
    pub timeout: u64,
}

impl GlobalArgs {
    /// Settings from `--config` (or defaults) with command-line overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("failed to load settings from '{}'", path.display()))?,
            None => Settings::default(),
        };
        if let Some(socket) = &self.socket {
            settings.socket_path = Some(socket.clone());
        }
        Ok(settings)
    }

    pub fn client(&self) -> Result<Client> {
        let settings = self.settings()?;
        Ok(Client::from_settings(&settings).with_timeout(Duration::from_secs(self.timeout)))
    }
}

/// Identifies an already-initialized backup set.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Backup set name.
    pub name: String,

    /// Compatibility key given at `init`.
    #[arg(long, short = 'k')]
    pub key: String,
}

impl SetArgs {
    pub fn config(&self) -> BackupSetConfig {
        BackupSetConfig::named(&self.name, &self.key)
    }
}
