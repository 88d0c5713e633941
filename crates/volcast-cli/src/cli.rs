//! Argument parsing, logging setup and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use volcast_config::{ConcurrencyMode, CopyPolicy, VolcastConfig, load_config, validate_config};
use volcast_telemetry::{LoggingConfig, init_logging, log_format_from_setting};

use crate::commands::copy::handle_copy;
use crate::commands::volumes::handle_volumes;
use crate::error::{CliError, CliResult};

/// Parses CLI arguments, executes the requested command and reports errors on
/// stderr. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(&LoggingConfig {
        level: &config.telemetry.level,
        format: log_format_from_setting(config.telemetry.format.as_deref()),
        build_sha: option_env!("VOLCAST_BUILD_SHA").unwrap_or("dev"),
    })
    .map_err(CliError::failure)?;

    match cli.command {
        Command::Copy(args) => handle_copy(&config, args, cli.output).await,
        Command::Volumes => handle_volumes(cli.output).await,
    }
}

#[derive(Parser)]
#[command(
    name = "volcast",
    version,
    about = "Copy a folder onto several removable volumes and label them"
)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "VOLCAST_CONFIG",
        help = "JSON configuration document"
    )]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for reports"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Copy the top-level files of a folder onto every volume.
    Copy(CopyArgs),
    /// List removable volumes that would be used without --volume.
    Volumes,
}

#[derive(Args, Debug, Default)]
pub(crate) struct CopyArgs {
    #[arg(long, help = "Folder whose top-level files are copied")]
    pub(crate) source: PathBuf,
    #[arg(long, help = "Destination folder name and label prefix")]
    pub(crate) name: String,
    #[arg(
        long = "volume",
        help = "Mount root of a target volume; repeat to set the label order"
    )]
    pub(crate) volumes: Vec<PathBuf>,
    #[arg(long, help = "Copy to all volumes concurrently")]
    pub(crate) parallel: bool,
    #[arg(long, help = "Attempts per file before giving up on a volume")]
    pub(crate) max_attempts: Option<u32>,
    #[arg(long, help = "Delay between attempts in milliseconds")]
    pub(crate) backoff_ms: Option<u64>,
    #[arg(long, help = "Leave volume labels unchanged")]
    pub(crate) no_relabel: bool,
    #[arg(long, help = "Print Prometheus metrics to stderr after the run")]
    pub(crate) print_metrics: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Layer command-line flags over the loaded policy and re-validate.
pub(crate) fn effective_policy(config: &VolcastConfig, args: &CopyArgs) -> CliResult<CopyPolicy> {
    let mut effective = config.clone();
    if args.parallel {
        effective.copy.concurrency = ConcurrencyMode::Parallel;
    }
    if let Some(max_attempts) = args.max_attempts {
        effective.copy.max_attempts = max_attempts;
    }
    if let Some(backoff_ms) = args.backoff_ms {
        effective.copy.backoff_ms = backoff_ms;
    }
    if args.no_relabel {
        effective.copy.relabel = false;
    }
    validate_config(&effective)?;
    Ok(effective.copy)
}
