//! Prepare command - build and cache a daemon version
//!
//! Prints the cached binary path on stdout.

use crate::cli::args::PrepareArgs;
use crate::config::Config;
use crate::error::SamulatorResult;
use crate::ui::{TaskSpinner, UiContext};

/// Execute the prepare command
pub async fn execute(args: PrepareArgs, config: &Config) -> SamulatorResult<()> {
    let ctx = UiContext::detect();
    let resolver = super::open_resolver(config).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Preparing {}...", args.version));

    match resolver.resolve(&args.version).await {
        Ok(path) => {
            spinner.stop(&format!("Version {} is prepared", args.version));
            println!("{}", path.display());
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Failed to prepare {}", args.version));
            Err(e)
        }
    }
}
