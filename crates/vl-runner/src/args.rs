//! Command line arguments for the `vecload` binary.

use std::path::PathBuf;

use clap::Parser;

/// vecload - load generator for vector databases
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "vecload")]
#[command(about = "Drive concurrent insert and search load against a vector store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct RunArgs {
    /// Run configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Store address; falls back to VECLOAD_HOST, then localhost:19530
    #[arg(long)]
    pub address: Option<String>,

    /// Number of concurrent virtual users
    #[arg(long)]
    pub vus: Option<usize>,

    /// Search iterations per virtual user
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Collection name
    #[arg(long)]
    pub collection: Option<String>,

    /// Vector dimension of the generated schema
    #[arg(long)]
    pub dim: Option<usize>,

    /// Rows inserted during setup
    #[arg(long)]
    pub rows: Option<usize>,

    /// Results per query
    #[arg(short = 'k', long = "top-k")]
    pub top_k: Option<usize>,

    /// Keep the collection after the run
    #[arg(long)]
    pub keep: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl RunArgs {
    /// Default filter directive when `RUST_LOG` is unset.
    pub fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
