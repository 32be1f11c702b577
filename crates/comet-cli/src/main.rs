mod cmd_diff;
mod cmd_report;
mod cmd_resolve;
mod cmd_save;
mod logging;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comet_store::StorageResolver;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "comet")]
#[command(about = "Track, diff, and summarize the edit history of notebooks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Storage root (default: $COMET_DATA_DIR, then ~/.comet)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record an action and persist the notebook if it changed; reads the
    /// action JSON from stdin unless --input is given
    Save(cmd_save::SaveArgs),
    /// Compare two notebook files cell by cell
    Diff {
        /// Current notebook
        current: PathBuf,

        /// Reference notebook (a missing file means nothing to compare)
        reference: PathBuf,

        /// Only compare these positions (comma-separated)
        #[arg(long, value_delimiter = ',')]
        indices: Option<Vec<usize>>,

        /// Also compare code cell outputs
        #[arg(long)]
        outputs: bool,
    },
    /// Print the cell positions an action may have changed
    Resolve {
        /// Action name (e.g. "insert-cell-below")
        #[arg(long)]
        action: String,

        /// Cursor cell position
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Selected cell positions (comma-separated)
        #[arg(long, value_delimiter = ',')]
        indices: Vec<usize>,

        /// Cell count after the action
        #[arg(long)]
        len_current: usize,

        /// Cell count of the last persisted snapshot
        #[arg(long)]
        len_prior: usize,
    },
    /// Summarize a notebook's tracked history
    Report {
        /// Path of the tracked notebook
        #[arg(long)]
        notebook: PathBuf,
    },
    /// List archived versions and snapshot commits
    Versions {
        /// Path of the tracked notebook
        #[arg(long)]
        notebook: PathBuf,
    },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let resolver = storage_resolver(cli.data_dir);

    match cli.command {
        Commands::Save(args) => cmd_save::run(args, &resolver, cli.pretty),
        Commands::Diff {
            current,
            reference,
            indices,
            outputs,
        } => cmd_diff::run(current, reference, indices, outputs, cli.pretty),
        Commands::Resolve {
            action,
            index,
            indices,
            len_current,
            len_prior,
        } => cmd_resolve::run(action, index, indices, len_current, len_prior, cli.pretty),
        Commands::Report { notebook } => cmd_report::run_report(notebook, &resolver, cli.pretty),
        Commands::Versions { notebook } => {
            cmd_report::run_versions(notebook, &resolver, cli.pretty)
        }
    }
}

fn storage_resolver(data_dir: Option<PathBuf>) -> StorageResolver {
    match data_dir {
        Some(dir) => StorageResolver::new().with_data_dir(dir),
        None => StorageResolver::new(),
    }
}

/// Serialize `value` as compact or pretty JSON.
pub(crate) fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize output")
    } else {
        serde_json::to_string(value).context("Failed to serialize output")
    }
}
