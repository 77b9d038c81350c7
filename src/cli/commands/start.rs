//! Start command - run one daemon version in the foreground

use crate::cli::args::StartArgs;
use crate::cli::shutdown_signal;
use crate::config::Config;
use crate::error::SamulatorResult;
use crate::orchestrator::log_node_output;
use crate::runner::NodeRunner;
use crate::ui::{TaskSpinner, UiContext};
use tracing::{info, warn};

/// Execute the start command
pub async fn execute(args: StartArgs, config: &Config) -> SamulatorResult<()> {
    let ctx = UiContext::detect();
    let resolver = super::open_resolver(config).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Resolving {}...", args.version));
    let binary = match resolver.resolve(&args.version).await {
        Ok(path) => {
            spinner.stop(&format!("Using {}", path.display()));
            path
        }
        Err(e) => {
            spinner.stop_error(&format!("Failed to prepare {}", args.version));
            return Err(e);
        }
    };

    let mut runner = NodeRunner::with_config(&binary, &config.runner)?;
    runner.with_args(args.params.iter().cloned());
    info!(version = %args.version, "Starting with args: {:?}", runner.additional_args());

    let output = runner.split_output();
    let logger = tokio::spawn(log_node_output(output, args.version.clone()));

    let result = tokio::select! {
        result = runner.run_start() => result,
        _ = shutdown_signal() => {
            info!("Interrupted, stopping node");
            Ok(())
        }
    };

    if let Err(e) = runner.cleanup().await {
        warn!("Cleanup failed: {}", e);
    }
    if let Err(e) = logger.await {
        warn!("Output logger failed: {}", e);
    }

    result
}
