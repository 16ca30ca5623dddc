//! `snapkeep init <name> --key <key> [retention flags]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use snapkeep_core::{BackupSetConfig, TierDurations};

use super::{GlobalArgs, SetArgs};

#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub set: SetArgs,

    /// Days to keep every initial snapshot.
    #[arg(long, default_value_t = 7)]
    pub initial: u32,

    /// Months to keep one snapshot per day.
    #[arg(long, default_value_t = 1)]
    pub day: u32,

    /// Months to keep one snapshot per month.
    #[arg(long, default_value_t = 12)]
    pub month: u32,

    /// Years to keep one snapshot per year.
    #[arg(long, default_value_t = 5)]
    pub year: u32,

    /// Expected minutes between rotations.
    #[arg(long, default_value_t = 60)]
    pub frequency: u32,

    /// Minutes after the last snapshot during which rotations skip a new one.
    #[arg(long, default_value_t = 0)]
    pub rotation_delay: u32,

    /// Root for this set's tree instead of the daemon default.
    #[arg(long, value_name = "DIR")]
    pub backup_root: Option<PathBuf>,
}

impl InitArgs {
    pub fn config(&self) -> BackupSetConfig {
        BackupSetConfig {
            backup_root: self.backup_root.clone(),
            frequency: self.frequency,
            rotation_delay: self.rotation_delay,
            durations: TierDurations {
                initial: self.initial,
                day: self.day,
                month: self.month,
                year: self.year,
            },
            ..self.set.config()
        }
    }

    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let client = global.client()?;
        let working = client
            .init(&self.config())
            .with_context(|| format!("failed to init backup set '{}'", self.set.name))?;
        println!("{}", working.display());
        Ok(())
    }
}
