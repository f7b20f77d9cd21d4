//! Init command - write a starting configuration

use crate::cli::app::InitArgs;
use anyhow::{Result, bail};
use std::path::Path;
use vcxwatch_core::Config;

pub fn execute(args: InitArgs, config: Option<&Path>) -> Result<()> {
    let path = args.path.unwrap_or_else(|| super::config_path(config));

    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::write_template(&path)?;
    println!("Created {}", path.display());
    println!("Edit project_file and [generator] program, then run `vcxwatch check`.");
    Ok(())
}
