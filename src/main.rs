//! Samulator CLI entry point

use clap::Parser;
use console::style;
use samulator::cli::{Cli, Commands, LogFormat};
use samulator::config::ConfigManager;
use samulator::error::SamulatorResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> SamulatorResult<()> {
    let cli = Cli::parse();

    let manager = ConfigManager::new(cli.config.clone());
    let (config, source) = manager.load().await?;

    let format = cli.log_format.unwrap_or(match config.general.log_format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_tracing(cli.verbose, format);
    debug!("Loaded configuration from {}", source);

    match cli.command {
        Commands::Prepare(args) => samulator::cli::commands::prepare(args, &config).await,
        Commands::Start(args) => samulator::cli::commands::start(args, &config).await,
        Commands::Simulate(args) => samulator::cli::commands::simulate(args, &config).await,
        Commands::Cache(args) => samulator::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            samulator::cli::commands::config(args, &manager, &config, &source).await
        }
    }
}

/// 0 = node output and progress, 1 = debug, 2+ = trace; RUST_LOG wins when set
fn init_tracing(verbose: u8, format: LogFormat) {
    let default = match verbose {
        0 => "samulator=info",
        1 => "samulator=debug",
        _ => "samulator=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.without_time().init(),
    }
}
