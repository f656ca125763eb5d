use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use promdiag::report::EXIT_FAILURE;
use promdiag::{Collector, CollectorConfig, DEFAULT_ARCHIVE_NAME, Preset, RunReport, exit_code};

/// Diagnostics tooling for Prometheus-style servers
///
/// Collects profiling data and metrics from a running server into a single
/// tar.gz bundle for offline inspection.
#[derive(Parser, Debug)]
#[command(name = "promdiag", version, about)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Report format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// JSON collector configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch debug information.
    #[command(subcommand)]
    Debug(DebugCommand),
}

#[derive(Subcommand, Debug)]
enum DebugCommand {
    /// Fetch profiling debug information.
    Pprof(DebugArgs),
    /// Fetch metrics debug information.
    Metrics(DebugArgs),
    /// Fetch all debug information.
    All(DebugArgs),
}

#[derive(Args, Debug)]
struct DebugArgs {
    /// Server to get debug information from.
    server: String,

    /// Directory to write the bundle into.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// File name of the bundle.
    #[arg(long, default_value = DEFAULT_ARCHIVE_NAME)]
    archive_name: String,

    /// Per-resource fetch timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let Command::Debug(debug) = cli.command;
    let (preset, args) = match debug {
        DebugCommand::Pprof(args) => (Preset::Pprof, args),
        DebugCommand::Metrics(args) => (Preset::Metrics, args),
        DebugCommand::All(args) => (Preset::All, args),
    };

    let collector = match build_collector(cli.config.as_deref(), &args) {
        Ok(collector) => collector,
        Err(e) => {
            eprintln!("error creating debug writer: {}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let mut spec = preset.spec(&args.server);
    spec.archive_name = args.archive_name;

    let outcome = collector.run(&spec).await;
    let report = RunReport::from_outcome(&outcome);

    match cli.format {
        OutputFormat::Text if outcome.is_ok() => print!("{}", report.to_text()),
        OutputFormat::Text => eprint!("{}", report.to_text()),
        OutputFormat::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: failed to render report: {}", e),
        },
    }

    ExitCode::from(exit_code(&outcome))
}

/// `RUST_LOG` wins over the verbosity flag when it is set and parses
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "warn" };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

fn build_collector(
    config_path: Option<&std::path::Path>,
    args: &DebugArgs,
) -> promdiag::Result<Collector> {
    let mut config = match config_path {
        Some(path) => CollectorConfig::from_json_file(path)?,
        None => CollectorConfig::default(),
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(secs) = args.timeout {
        config.fetch_timeout = Duration::from_secs(secs);
    }

    Collector::new(config)
}
