use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use seis_logger::{LevelFilter, Logger};
use seisflows::domain::Role;
use seisflows::domain::constants::{CHECKPOINT_PATH, LOG_DIR, LOG_FILE, OUTPUT_DIR, PAR_FILE, STOP_AFTER};
use seisflows::kernel::checkpoint::CheckpointStore;
use seisflows::kernel::config::{ConfigSnapshot, load_snapshot};
use seisflows::kernel::{Controller, RunOutcome, Session};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Seismic inversion workflows with checkpoint and resume.
#[derive(Debug, Parser)]
#[command(name = "seisflows", version, about)]
struct Cli {
    /// Detailed log records (target, source location, thread).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assembles a session from a parameter file and runs its workflow.
    Run(RunArgs),
    /// Restores a checkpoint and runs the rest of its workflow.
    Resume {
        dir: PathBuf,
        #[arg(long)]
        stop_after: Option<String>,
    },
    /// Resolves and validates a parameter file without running anything.
    Check {
        #[arg(short, long, default_value = PAR_FILE)]
        parameters: PathBuf,
    },
    /// Lists what a checkpoint directory holds.
    Status { dir: PathBuf },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(short, long, default_value = PAR_FILE)]
    parameters: PathBuf,
    /// Last task to run.
    #[arg(long)]
    stop_after: Option<String>,
    /// Where to checkpoint when the run stops early; defaults to the `CHECKPOINT` path.
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => {
            let mut config = load_snapshot(&args.parameters)?;
            if let Some(task) = &args.stop_after {
                config.set_parameter(STOP_AFTER, task.as_str());
            }
            let _logger = logger(cli.verbose, Some(&config))?;
            let checkpoint = args.checkpoint.unwrap_or_else(|| default_checkpoint(&config));

            let mut controller = Controller::new(seisflows::catalog());
            controller.assemble(config)?;
            drive(&mut controller, &checkpoint)
        },
        Command::Resume { dir, stop_after } => {
            let summary = CheckpointStore::open_existing(&dir)?.inspect()?;
            let _logger = logger(cli.verbose, Some(&summary.config))?;

            let mut controller = Controller::new(seisflows::catalog());
            controller.restore(&dir)?;
            if let Some(session) = controller.session_mut() {
                let config = session.config_mut();
                config.remove_parameter(STOP_AFTER);
                if let Some(task) = stop_after {
                    config.set_parameter(STOP_AFTER, task);
                }
            }
            drive(&mut controller, &dir)
        },
        Command::Check { parameters } => {
            let _logger = logger(cli.verbose, None)?;
            let config = load_snapshot(&parameters)?;
            let session = Session::assemble(config, seisflows::catalog())?;
            report(&session)
        },
        Command::Status { dir } => {
            let summary = CheckpointStore::open_existing(&dir)?.inspect()?;
            writeln!(io::stdout().lock(), "{summary}")?;
            Ok(())
        },
    }
}

fn logger(verbose: bool, config: Option<&ConfigSnapshot>) -> anyhow::Result<Logger> {
    let level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let builder = Logger::builder().name(LOG_FILE).verbose(verbose).level(level);
    let logger = match config {
        Some(config) => {
            let dir = config.path("LOG").map_or_else(|| PathBuf::from(LOG_DIR), Path::to_path_buf);
            builder.path(dir).init()
        },
        None => builder.init(),
    };
    logger.context("Initializing logging")
}

fn default_checkpoint(config: &ConfigSnapshot) -> PathBuf {
    config.path(CHECKPOINT_PATH).map_or_else(
        || config.path("OUTPUT").unwrap_or(Path::new(OUTPUT_DIR)).join("checkpoint"),
        Path::to_path_buf,
    )
}

/// Runs the workflow; a run that stops early is checkpointed to `checkpoint`.
fn drive(controller: &mut Controller, checkpoint: &Path) -> anyhow::Result<()> {
    match controller.run()? {
        RunOutcome::Completed => {
            info!("Workflow complete");
        },
        RunOutcome::StoppedAfter(task) => {
            controller.checkpoint(checkpoint)?;
            info!(task, dir = %checkpoint.display(), "Stopped; resume with `seisflows resume`");
        },
        RunOutcome::Interrupted { before } => {
            controller.checkpoint(checkpoint)?;
            warn!(before, dir = %checkpoint.display(), "Interrupted");
        },
    }
    Ok(())
}

fn report(session: &Session) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    for role in Role::ALL {
        match session.registry().get(role) {
            Some(component) => {
                let tasks = component.tasks();
                write!(out, "{role:<12} {} ({})", component.name(), component.type_name())?;
                if tasks.is_empty() {
                    writeln!(out)?;
                } else {
                    writeln!(out, ": {}", tasks.join(" -> "))?;
                }
            },
            None => writeln!(out, "{role:<12} disabled")?,
        }
    }
    writeln!(out, "run id {}", session.run_id())?;
    Ok(())
}
