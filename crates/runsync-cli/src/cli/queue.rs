use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    Status,
    Work {
        #[arg(long, default_value_t = 20)]
        iterations: u32,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        #[arg(long, default_value_t = 500)]
        sleep_ms: u64,
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        stop_when_idle: bool,
    },
    Daemon {
        /// Zero runs until interrupted.
        #[arg(long, default_value_t = 0)]
        max_cycles: u32,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        #[arg(long, default_value_t = 1000)]
        sleep_ms: u64,
        #[arg(long, default_value_t = false, action = clap::ArgAction::Set)]
        stop_when_idle: bool,
        #[arg(long, default_value_t = 3)]
        idle_cycles: u32,
    },
    DeadLetters {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    Redrive {
        dead_letter_id: i64,
    },
}
