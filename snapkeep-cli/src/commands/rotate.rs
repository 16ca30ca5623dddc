//! `snapkeep rotate <name> --key <key>`

use anyhow::{Context, Result};

use super::{GlobalArgs, SetArgs};

pub fn run(args: SetArgs, global: &GlobalArgs) -> Result<()> {
    let client = global.client()?;
    let completed = client
        .rotate(&args.config())
        .with_context(|| format!("failed to rotate backup set '{}'", args.name))?;
    println!("{completed}");
    Ok(())
}
