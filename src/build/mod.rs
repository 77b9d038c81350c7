//! Build pipeline boundary
//!
//! The core only needs "given a version, produce an executable binary or
//! fail". How the binary gets produced (clone, checkout, cross-compile)
//! is the pipeline's business.

mod pipeline;
mod resolver;

pub use pipeline::CommandPipeline;
pub use resolver::ArtifactResolver;

use crate::error::SamulatorResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// A freshly built binary, before it is copied into the cache
#[derive(Debug, Clone)]
pub struct BuiltArtifact {
    /// Path of the produced binary
    pub path: PathBuf,

    /// Scratch directory the build ran in, if any
    pub workdir: Option<PathBuf>,
}

/// Produces daemon binaries for a version identifier
///
/// Only invoked on a cache miss.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Build `version` and return the produced binary
    async fn build(&self, version: &str) -> SamulatorResult<BuiltArtifact>;

    /// Remove build leftovers once the artifact has been cached
    async fn cleanup(&self, _artifact: &BuiltArtifact) -> SamulatorResult<()> {
        Ok(())
    }

    /// Human-readable pipeline name for display
    fn pipeline_name(&self) -> &'static str;
}
