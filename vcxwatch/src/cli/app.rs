use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vcxwatch",
    version,
    about = "vcxwatch - keep a generated .vcxproj and its source tree in sync",
    long_about = "vcxwatch watches a source tree, regenerates the Visual C++ project descriptor \
                  when files come and go, and removes source files the regenerated descriptor \
                  no longer references."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Report deletions without touching the filesystem
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the source tree and reconcile on changes
    #[command(about = "Watch the source tree and reconcile whenever files are added or removed")]
    Watch,

    /// Run one reconciliation now
    #[command(about = "Delete unreferenced files, regenerate the project and reconcile again")]
    Run,

    /// Delete files that fell out of the project while nothing was watching
    #[command(about = "Compare the project with the last committed state without regenerating")]
    Patrol,

    /// Validate the configuration
    #[command(about = "Validate the configuration and print the resolved settings")]
    Check,

    /// List watched files the project does not reference
    #[command(about = "List source files under the watch paths that no descriptor references")]
    Orphans,

    /// Replace the reference cache with the current descriptor contents
    #[command(
        name = "reset-cache",
        about = "Commit the current descriptors as the reference state without deleting anything"
    )]
    ResetCache,

    /// Write a default configuration file
    #[command(about = "Write a commented default configuration file")]
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Where to write the configuration (defaults to --config or vcxwatch.toml)
    #[arg(help = "Path of the configuration file to create")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long, help = "Overwrite an existing configuration file")]
    pub force: bool,
}
