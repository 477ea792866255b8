use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relnotes – post Azure DevOps release notes to Slack
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Activate verbose output (-v, -vv, etc.)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report the latest release of a branch to Slack
    Notify {
        /// Source branch (e.g., refs/heads/main); overrides BRANCH_NAME
        #[arg(short, long)]
        branch: Option<String>,

        /// Slack channel; overrides SLACK_CHANNEL
        #[arg(long)]
        channel: Option<String>,

        /// Print the report instead of posting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print build information
    Version {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Log filter directive for the requested verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
