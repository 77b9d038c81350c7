//! CLI command implementations

pub mod cache;
pub mod config;
pub mod prepare;
pub mod simulate;
pub mod start;

pub use cache::execute as cache;
pub use config::execute as config;
pub use prepare::execute as prepare;
pub use simulate::execute as simulate;
pub use start::execute as start;

use crate::build::{ArtifactResolver, CommandPipeline};
use crate::cache::ArtifactCache;
use crate::config::Config;
use crate::error::SamulatorResult;
use std::sync::Arc;

/// Cache-then-build resolver wired from configuration
async fn open_resolver(config: &Config) -> SamulatorResult<ArtifactResolver> {
    let cache = ArtifactCache::open_or_create(&config.cache.root).await?;
    let pipeline = CommandPipeline::new(&config.build);
    Ok(
        ArtifactResolver::new(Arc::new(cache), Arc::new(pipeline), &config.cache.namespace)
            .keep_workdir(config.build.keep_workdir),
    )
}
