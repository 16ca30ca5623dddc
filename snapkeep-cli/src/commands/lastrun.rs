//! `snapkeep lastrun <name> --key <key>`

use anyhow::{Context, Result};

use super::{GlobalArgs, SetArgs};

pub fn run(args: SetArgs, global: &GlobalArgs) -> Result<()> {
    let client = global.client()?;
    let elapsed = client
        .last_run(&args.config())
        .with_context(|| format!("failed to query last run of '{}'", args.name))?;
    println!("{elapsed}");
    Ok(())
}
