use clap::{Args, Subcommand, ValueEnum};
use runsync_core::models::Platform;

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    AwsHealthomics,
    SeqeraCloud,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::AwsHealthomics => Self::AwsHealthOmics,
            PlatformArg::SeqeraCloud => Self::SeqeraCloud,
        }
    }
}

#[derive(Debug, Args)]
pub struct RunPutArgs {
    #[arg(long)]
    pub run_id: Option<String>,
    #[arg(long)]
    pub laboratory_id: String,
    #[arg(long)]
    pub organization_id: String,
    #[arg(long, value_enum)]
    pub platform: PlatformArg,
    #[arg(long)]
    pub external_run_id: Option<String>,
    #[arg(long)]
    pub workspace_id: Option<String>,
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub workflow_name: String,
    #[arg(long, default_value = "")]
    pub owner: String,
    /// Opaque run settings as a JSON object.
    #[arg(long, default_value = "{}")]
    pub settings: String,
    #[arg(long, default_value = "runsync")]
    pub created_by: String,
    /// Publish the first status-check message right away.
    #[arg(long, default_value_t = false)]
    pub track: bool,
}

#[derive(Debug, Subcommand)]
pub enum RunCommand {
    Put(RunPutArgs),
    Show {
        run_id: String,
    },
    List {
        #[arg(long)]
        laboratory_id: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Track {
        run_id: String,
    },
}
