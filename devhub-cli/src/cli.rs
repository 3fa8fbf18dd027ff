//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devhub-migrate", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Snapshot file holding the databases (overrides store.data_path)
    #[arg(long, value_name = "PATH", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Apply pending migrations
    Up {
        /// Highest version to apply; latest when omitted
        #[arg(long, value_name = "VERSION")]
        target: Option<i64>,

        /// Only migrate this tenant's database
        #[arg(long, value_name = "ID", conflicts_with = "skip_tenants")]
        tenant: Option<String>,

        /// Migrate the default database only
        #[arg(long)]
        skip_tenants: bool,
    },

    /// Revert migrations down to a version
    Down {
        /// Version the database ends at
        #[arg(long, value_name = "VERSION")]
        target: i64,

        /// Only migrate this tenant's database
        #[arg(long, value_name = "ID")]
        tenant: Option<String>,
    },

    /// Show the version of every database
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered migrations
    List,
}

impl Commands {
    /// Whether the command writes to the store
    pub fn mutates(&self) -> bool {
        matches!(self, Commands::Up { .. } | Commands::Down { .. })
    }
}
