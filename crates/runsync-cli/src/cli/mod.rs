use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod queue;
mod run;


pub use queue::{QueueArgs, QueueCommand};
pub use run::{RunArgs, RunCommand, RunPutArgs};

#[derive(Debug, Parser)]
#[command(name = "runsync")]
#[command(about = "Laboratory run-status reconciliation worker", version)]
pub struct Cli {
    #[arg(long, default_value = ".runsync")]
    pub root: PathBuf,

    /// Emit diagnostic logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Init,
    Run(RunArgs),
    Queue(QueueArgs),
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
