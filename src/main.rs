use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use otgen::config::{parse_interval, InputFormat, ModelSource, RunConfig};
use otgen::model::MetricsMode;

#[derive(Parser)]
#[command(
    name = "otgen",
    about = "Run traffic on an Open Traffic Generator API endpoint",
    version,
    long_about = None
)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request an OTG API endpoint to run an OTG model
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// URL of OTG API endpoint. Example: https://otg-api-endpoint
    #[arg(short, long, env = "OTG_API", default_value = "https://localhost")]
    api: String,

    /// Ignore X.509 certificate validation of OTG API endpoint
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Format of OTG input is YAML. Assumed format by default
    #[arg(short, long, conflicts_with = "json")]
    yaml: bool,

    /// Format of OTG input is JSON
    #[arg(short, long)]
    json: bool,

    /// OTG model file. If not provided, will use stdin
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Metrics type to report
    #[arg(short, long, value_enum, default_value_t = MetricsMode::Port)]
    metrics: MetricsMode,

    /// Interval to pull OTG metrics. Valid time units are 'ms', 's', 'm', 'h'. Example: 1s
    #[arg(short, long, default_value = "0.5s", value_parser = parse_interval)]
    interval: Duration,

    /// How long to wait before forcing traffic to stop, in multiples of ETA. Example: 1.5 (default is no limit)
    #[arg(short = 'x', long, default_value_t = 0.0)]
    xeta: f64,
}

impl RunArgs {
    fn into_run_config(self) -> RunConfig {
        RunConfig {
            api: self.api,
            verify_tls: !self.insecure,
            format: if self.json {
                InputFormat::Json
            } else {
                InputFormat::Yaml
            },
            source: self.file.map_or(ModelSource::Stdin, ModelSource::File),
            metrics: self.metrics,
            interval: self.interval,
            xeta: self.xeta,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries metrics JSON.
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let report = otgen::run(args.into_run_config()).await?;
            tracing::info!(
                snapshots = report.snapshots,
                elapsed = ?report.elapsed,
                verdict = ?report.verdict,
                "Run complete"
            );
        }
    }

    Ok(())
}
