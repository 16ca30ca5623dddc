//! snapkeep: backup snapshot retention daemon and client.
//!
//! # Usage
//!
//! ```text
//! snapkeep daemon [-p <backup-dir>]
//! snapkeep init <name> --key <key> [--initial N --day N --month N --year N]
//!               [--frequency MIN] [--rotation-delay MIN] [--backup-root DIR]
//! snapkeep rotate <name> --key <key>
//! snapkeep lastrun <name> --key <key>
//! ```
//!
//! Global flags: `--socket <path>`, `--config <file>`, `--timeout <secs>`.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonArgs, init::InitArgs, GlobalArgs, SetArgs};

#[derive(Parser, Debug)]
#[command(
    name = "snapkeep",
    version,
    about = "Keep tiered, hardlinked snapshots of backup sets",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the retention daemon in the foreground.
    Daemon(DaemonArgs),

    /// Register a backup set and print its working directory.
    Init(InitArgs),

    /// Promote the working snapshot and prune expired ones.
    Rotate(SetArgs),

    /// Print the time elapsed since the set's last rotation.
    Lastrun(SetArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon(args) => args.run(&cli.global),
        Commands::Init(args) => args.run(&cli.global),
        Commands::Rotate(args) => commands::rotate::run(args, &cli.global),
        Commands::Lastrun(args) => commands::lastrun::run(args, &cli.global),
    }
}
