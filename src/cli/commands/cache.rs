//! Cache command - inspect the artifact cache

use crate::cache::{ArtifactCache, CachedArtifact};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::Config;
use crate::error::SamulatorResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> SamulatorResult<()> {
    match args.action {
        CacheAction::List { format } => list_artifacts(config, format).await,
    }
}

async fn list_artifacts(config: &Config, format: OutputFormat) -> SamulatorResult<()> {
    let cache = ArtifactCache::open_or_create(&config.cache.root).await?;
    let artifacts = cache.list().await;

    if artifacts.is_empty() {
        match format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(
                    &ctx,
                    &format!("No cached versions in {}", cache.root().display()),
                );
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Table => print_table(&artifacts),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&artifacts)?),
        OutputFormat::Plain => print_plain(&artifacts),
    }

    Ok(())
}

fn print_table(artifacts: &[CachedArtifact]) {
    println!(
        "{:<16} {:<24} {}",
        style("NAMESPACE").bold(),
        style("VERSION").bold(),
        style("PATH").bold()
    );
    println!("{}", "-".repeat(80));

    for artifact in artifacts {
        println!(
            "{:<16} {:<24} {}",
            artifact.namespace,
            artifact.version,
            style(artifact.path.display()).dim()
        );
    }

    println!();
    println!("Total: {} cached version(s)", artifacts.len());
}

fn print_plain(artifacts: &[CachedArtifact]) {
    for artifact in artifacts {
        println!("{}@{}", artifact.namespace, artifact.version);
    }
}
