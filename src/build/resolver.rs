//! Cache-first artifact resolution

use crate::build::BuildPipeline;
use crate::cache::ArtifactCache;
use crate::error::SamulatorResult;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Resolves a version to a cached binary, building it on a miss
///
/// Concurrent requests for the same version share one build.
pub struct ArtifactResolver {
    cache: Arc<ArtifactCache>,
    pipeline: Arc<dyn BuildPipeline>,
    namespace: String,
    keep_workdir: bool,
    builds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ArtifactResolver {
    /// Create a resolver storing artifacts under `namespace`
    pub fn new(
        cache: Arc<ArtifactCache>,
        pipeline: Arc<dyn BuildPipeline>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            pipeline,
            namespace: namespace.into(),
            keep_workdir: false,
            builds: Mutex::new(HashMap::new()),
        }
    }

    /// Keep build work directories after caching
    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    /// Namespace artifacts are cached under
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path of the cached binary for `version`, building it if needed
    pub async fn resolve(&self, version: &str) -> SamulatorResult<PathBuf> {
        if let Some(path) = self.lookup(version).await? {
            return Ok(path);
        }

        let build_lock = {
            let mut builds = self.builds.lock().await;
            Arc::clone(builds.entry(version.to_string()).or_default())
        };
        let result = {
            let _guard = build_lock.lock().await;
            self.build_and_cache(version).await
        };

        let mut builds = self.builds.lock().await;
        // Last one out drops the entry; later callers hit the cache or rebuild
        if Arc::strong_count(&build_lock) == 2 {
            builds.remove(version);
        }
        result
    }

    /// Build `version` and store it, unless another task already did
    async fn build_and_cache(&self, version: &str) -> SamulatorResult<PathBuf> {
        if let Some(path) = self.lookup(version).await? {
            return Ok(path);
        }

        info!(
            "Cache miss for {}@{}, building with {}",
            self.namespace,
            version,
            self.pipeline.pipeline_name()
        );
        let artifact = self.pipeline.build(version).await?;
        let cached = self
            .cache
            .cache(&self.namespace, version, &artifact.path)
            .await;

        if !self.keep_workdir {
            if let Err(e) = self.pipeline.cleanup(&artifact).await {
                warn!("Failed cleaning build of {}: {}", version, e);
            }
        }

        cached?;
        self.cache.get(&self.namespace, version).await
    }

    async fn lookup(&self, version: &str) -> SamulatorResult<Option<PathBuf>> {
        match self.cache.get(&self.namespace, version).await {
            Ok(path) => {
                debug!("Cache hit for {}@{}: {}", self.namespace, version, path.display());
                Ok(Some(path))
            }
            Err(e) if e.is_cache_miss() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuiltArtifact;
    use crate::error::SamulatorError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FakePipeline {
        out: PathBuf,
        builds: AtomicUsize,
        cleanups: AtomicUsize,
        fail: bool,
    }

    impl FakePipeline {
        fn new(out: PathBuf) -> Self {
            Self {
                out,
                builds: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl BuildPipeline for FakePipeline {
        async fn build(&self, version: &str) -> SamulatorResult<BuiltArtifact> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SamulatorError::Build {
                    version: version.to_string(),
                    reason: "compiler exploded".to_string(),
                });
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let path = self.out.join(format!("openbazaard_{version}"));
            tokio::fs::write(&path, version).await.unwrap();
            Ok(BuiltArtifact {
                path,
                workdir: None,
            })
        }

        async fn cleanup(&self, _artifact: &BuiltArtifact) -> SamulatorResult<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pipeline_name(&self) -> &'static str {
            "fake"
        }
    }

    async fn resolver(root: &TempDir, pipeline: Arc<FakePipeline>) -> ArtifactResolver {
        let cache = ArtifactCache::open_or_create(root.path()).await.unwrap();
        ArtifactResolver::new(Arc::new(cache), pipeline, "openbazaard")
    }

    #[tokio::test]
    async fn builds_on_miss_then_hits_cache() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pipeline = Arc::new(FakePipeline::new(out.path().to_path_buf()));
        let resolver = resolver(&root, Arc::clone(&pipeline)).await;

        let first = resolver.resolve("v1").await.unwrap();
        let second = resolver.resolve("v1").await.unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with(root.path()));
        assert_eq!(std::fs::read(&first).unwrap(), b"v1");
        assert_eq!(pipeline.builds.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.cleanups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_build() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pipeline = Arc::new(FakePipeline::new(out.path().to_path_buf()));
        let resolver = Arc::new(resolver(&root, Arc::clone(&pipeline)).await);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let resolver = Arc::clone(&resolver);
            handles.push(tokio::spawn(async move { resolver.resolve("v2").await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(pipeline.builds.load(Ordering::SeqCst), 1);
        assert!(resolver.builds.lock().await.is_empty());
    }

    #[tokio::test]
    async fn build_failure_caches_nothing() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut pipeline = FakePipeline::new(out.path().to_path_buf());
        pipeline.fail = true;
        let pipeline = Arc::new(pipeline);
        let resolver = resolver(&root, Arc::clone(&pipeline)).await;

        let err = resolver.resolve("v3").await.unwrap_err();
        assert!(matches!(err, SamulatorError::Build { .. }));
        assert!(matches!(
            resolver.cache.get("openbazaard", "v3").await.unwrap_err(),
            SamulatorError::NoSuchNamespace(_)
        ));
    }
}
