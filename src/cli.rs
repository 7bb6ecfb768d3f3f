//! CLI struct definitions for the `apollo` binary.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "apollo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect, verify and store Apollo schedules."
)]
pub(crate) struct Cli {
    /// Raise log verbosity (-v debug, -vv trace). APOLLO_LOG overrides this.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Configuration file (defaults to ./apollo.toml when present).
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Show version information
    #[clap(name = "version")]
    Version,

    /// Verify, show and store schedules
    #[clap(name = "schedule", visible_alias = "s")]
    Schedule(ScheduleCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct ScheduleCli {
    #[clap(subcommand)]
    pub command: ScheduleCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ScheduleCommand {
    /// Check schedule documents for structural problems
    Verify {
        /// Schedule documents (JSON).
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// SQLite store supplying sub-schedules not given on the command line.
        #[clap(long)]
        store: Option<PathBuf>,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Print a schedule in depth-first order
    Show {
        file: PathBuf,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Write schedule documents into a SQLite store
    Import {
        #[clap(required = true)]
        files: Vec<PathBuf>,
        /// Target store (defaults to `[scheduling] store` from the config).
        #[clap(long)]
        store: Option<PathBuf>,
    },
}
