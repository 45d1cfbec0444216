//! backup-manager - command-line front-end for the backup state engine.

mod logger;
mod output;
mod scheduler;

use anyhow::Context;
use backup_core::{BackupEngine, BackupType, Config, StalenessStatus};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every source file to the backup location
    Full(RunArgs),

    /// Copy only new and modified files
    Smart(RunArgs),

    /// Remove backup copies of files deleted from the source
    Clean(RunArgs),

    /// Show recorded backup runs
    History {
        /// Only show the most recent N runs
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Report whether the last backup is overdue
    Check {
        /// Keep running and re-check on this cron schedule (e.g. "0 0 9 * * *")
        #[arg(long, value_name = "CRON")]
        watch: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// Commands that only read the state store
    fn is_read_only(&self) -> bool {
        matches!(self, Command::History { .. } | Command::Check { .. })
    }
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Directory to back up
    source: PathBuf,

    /// Backup location
    dest: PathBuf,
}

/// Readers use an existing store without creating or migrating anything, so
/// they keep working when its directory is not writable. A missing store is
/// created as usual.
fn open_engine(config: &Config, read_only: bool) -> backup_core::Result<BackupEngine> {
    if read_only && config.store.db_path.is_file() {
        BackupEngine::open_read_only(config)
    } else {
        BackupEngine::from_config(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;

    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    logger::init(log_level, config.log.file.as_deref())?;

    tracing::debug!(
        "Starting backup-manager v{} (store: {})",
        env!("CARGO_PKG_VERSION"),
        config.store.db_path.display()
    );

    let engine = open_engine(&config, cli.command.is_read_only())
        .with_context(|| format!("Failed to open state store {}", config.store.db_path.display()))?;

    match cli.command {
        Command::Full(args) => run_backup(&engine, BackupType::Full, args),
        Command::Smart(args) => run_backup(&engine, BackupType::Smart, args),
        Command::Clean(args) => run_backup(&engine, BackupType::Clean, args),
        Command::History { limit, json } => {
            let runs = engine.history()?;
            let skip = limit.map_or(0, |n| runs.len().saturating_sub(n));
            let runs = &runs[skip..];
            if json {
                println!("{}", serde_json::to_string_pretty(runs)?);
            } else {
                output::print_history(runs);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { watch: Some(cron), .. } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(scheduler::watch(Arc::new(engine), &cron))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { watch: None, json } => {
            let report = engine.check_staleness()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_staleness(&report);
            }
            // Non-zero when attention is needed, for use from cron or monitoring
            Ok(match report.status {
                StalenessStatus::Ok => ExitCode::SUCCESS,
                StalenessStatus::Overdue | StalenessStatus::NoHistory => ExitCode::from(2),
            })
        }
    }
}

fn run_backup(engine: &BackupEngine, backup_type: BackupType, args: RunArgs) -> anyhow::Result<ExitCode> {
    let outcome = engine
        .run(backup_type, &args.source, &args.dest)
        .with_context(|| format!("{backup_type} backup failed"))?;
    output::print_outcome(&outcome);
    Ok(ExitCode::SUCCESS)
}
