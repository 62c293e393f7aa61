use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use runsync_core::RunSync;
use runsync_core::models::NewLaboratoryRun;

use crate::cli::{Commands, QueueCommand, RunCommand, RunPutArgs};

mod queue;

use self::queue::{DaemonLimits, run_queue_daemon, run_queue_worker};

pub fn run_from_root(root: &Path, command: Commands) -> Result<()> {
    let app = RunSync::new(root)
        .with_context(|| format!("failed to open state under {}", root.display()))?;

    match command {
        Commands::Init => {
            app.initialize()?;
            println!("initialized {}", app.root().display());
            Ok(())
        }
        Commands::Run(args) => run_run(&app, args.command),
        Commands::Queue(args) => run_queue(&app, args.command),
        Commands::Logs { limit } => print_json(&app.list_request_logs(limit)?),
    }
}

fn run_run(app: &RunSync, command: RunCommand) -> Result<()> {
    match command {
        RunCommand::Put(args) => {
            let track = args.track;
            let new_run = new_run_from_args(args)?;
            let run = app.register_run(new_run)?;
            if track {
                let receipt = app.start_reconciliation(&run.run_id)?;
                print_json(&serde_json::json!({ "run": run, "receipt": receipt }))
            } else {
                print_json(&run)
            }
        }
        RunCommand::Show { run_id } => print_json(&app.get_run(&run_id)?),
        RunCommand::List {
            laboratory_id,
            limit,
        } => print_json(&app.list_runs(&laboratory_id, limit)?),
        RunCommand::Track { run_id } => print_json(&app.start_reconciliation(&run_id)?),
    }
}

fn run_queue(app: &RunSync, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::Status => print_json(&app.channel_overview()?),
        QueueCommand::Work {
            iterations,
            limit,
            concurrency,
            sleep_ms,
            stop_when_idle,
        } => {
            let report = run_queue_worker(
                app,
                iterations,
                limit,
                concurrency,
                sleep_ms,
                stop_when_idle,
            )?;
            print_json(&report)
        }
        QueueCommand::Daemon {
            max_cycles,
            limit,
            concurrency,
            sleep_ms,
            stop_when_idle,
            idle_cycles,
        } => {
            let report = run_queue_daemon(
                app,
                limit,
                concurrency,
                DaemonLimits {
                    max_cycles,
                    sleep_ms,
                    stop_when_idle,
                    idle_cycles,
                },
            );
            print_json(&report)
        }
        QueueCommand::DeadLetters { limit } => print_json(&app.list_dead_letters(limit)?),
        QueueCommand::Redrive { dead_letter_id } => {
            print_json(&app.redrive_dead_letter(dead_letter_id)?)
        }
    }
}

fn new_run_from_args(args: RunPutArgs) -> Result<NewLaboratoryRun> {
    let settings: serde_json::Value =
        serde_json::from_str(&args.settings).context("--settings must be valid JSON")?;
    if !settings.is_object() {
        anyhow::bail!("--settings must be a JSON object");
    }
    Ok(NewLaboratoryRun {
        run_id: args.run_id,
        laboratory_id: args.laboratory_id,
        organization_id: args.organization_id,
        platform: args.platform.into(),
        external_run_id: args.external_run_id,
        workspace_id: args.workspace_id,
        status: args.status,
        workflow_name: args.workflow_name,
        owner: args.owner,
        settings,
        created_by: args.created_by,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
