use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "docshift",
    about = "Migrate binary artifacts between object stores and relink their records",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "docshift.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the migration described by a plan file
    Run {
        /// Tabular plan file (CSV)
        plan: PathBuf,

        /// Exercise the pipeline on a small sample without writing to the
        /// destination or record store
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the progress ledger summary
    Status,

    /// Clear one item's ledger entry so a later run reprocesses it
    Clear {
        /// Source item id of the ledger entry to clear
        item_id: String,
    },
}
