use clap::{Parser, Subcommand};
use scribe_pipeline::cli::{self, ExitCode};
use scribe_pipeline::layout::ArtifactLayout;
use scribe_pipeline::logging::{self, LogFormat};
use scribe_pipeline::store::Store;
use scribe_pipeline::{Config, Orchestrator};
use std::path::PathBuf;
use tracing::error;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(version, about = "Durable, resumable batch pipeline for transcribing and translating interview recordings")]
struct Cli {
    /// Override the output/artifact root directory (config: output_directory).
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Override the SQLite database file path (config: database_file).
    #[arg(long, global = true)]
    database_file: Option<PathBuf>,

    /// Log output shape.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register new files with the tracking store.
    Discover(cli::discover::DiscoverArgs),
    /// Run the transcription and/or translation pools once.
    Start(cli::start::StartArgs),
    /// Print aggregate and (optionally) per-file status.
    Status(cli::status::StatusArgs),
    /// Run the pipeline in the foreground until interrupted.
    Monitor(cli::monitor::MonitorArgs),
    /// Reset stalled stages and optionally kick off one fresh pass.
    Restart(cli::restart::RestartArgs),
    /// Re-run transcription for currently-failing files with a wider retry budget.
    Retry(cli::retry::RetryArgs),
    /// Diagnose and repair problem files in one automatic sweep.
    Special(cli::special::SpecialArgs),
    /// Targeted repair actions (stalled/paths/transcripts/mark/hebrew).
    Fix(cli::fix::FixArgs),
    /// Audit translations on disk against the tracking store.
    Verify(cli::verify::VerifyArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.parse().unwrap_or_default();
    logging::init_logging(cli.verbose, log_format);

    match run(cli).await {
        Ok(code) => std::process::exit(code.code()),
        Err(e) => {
            error!("fatal: {e}");
            std::process::exit(ExitCode::Fatal.code());
        }
    }
}

async fn run(cli: Cli) -> scribe_pipeline::Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(output_dir) = cli.output_dir {
        config.output_directory = output_dir;
    }
    if let Some(database_file) = cli.database_file {
        config.database_file = database_file;
    }
    config.validate()?;

    let store = Store::connect(&config.database_file).await?;
    let layout = ArtifactLayout::new(config.output_directory.clone());
    let orchestrator = Orchestrator::new(store, layout, config);

    cli::monitor::install_signal_handler(&orchestrator);

    match cli.command {
        Command::Discover(args) => cli::discover::run(args, &orchestrator).await,
        Command::Start(args) => cli::start::run(args, &orchestrator).await,
        Command::Status(args) => cli::status::run(args, &orchestrator).await,
        Command::Monitor(args) => cli::monitor::run(args, &orchestrator).await,
        Command::Restart(args) => cli::restart::run(args, &orchestrator).await,
        Command::Retry(args) => cli::retry::run(args, &orchestrator).await,
        Command::Special(args) => cli::special::run(args, &orchestrator).await,
        Command::Fix(args) => cli::fix::run(args, &orchestrator).await,
        Command::Verify(args) => cli::verify::run(args, &orchestrator).await,
    }
}
