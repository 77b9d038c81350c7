//! Versioned artifact store
//!
//! Binaries are copied into `<root>/<namespace>/<file name>` and indexed
//! by version. Stored files are never overwritten.

use crate::cache::index::{load_index, tmp_index_path, write_index, VersionIndex};
use crate::error::{SamulatorError, SamulatorResult};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Mode forced onto every stored binary
#[cfg(unix)]
const ARTIFACT_MODE: u32 = 0o755;

/// One cached artifact, as reported by [`ArtifactCache::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedArtifact {
    pub namespace: String,
    pub version: String,
    pub path: PathBuf,
}

/// Persistent (namespace, version) -> binary path cache
///
/// The whole cache sits behind one read/write lock: lookups run
/// concurrently, index updates are exclusive.
pub struct ArtifactCache {
    root: PathBuf,
    namespaces: RwLock<HashMap<String, VersionIndex>>,
}

impl ArtifactCache {
    /// Open the cache at `root`, creating the directory if needed
    ///
    /// Every subdirectory of `root` is a namespace and must carry a
    /// readable index.
    pub async fn open_or_create(root: impl Into<PathBuf>) -> SamulatorResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            SamulatorError::io(format!("creating cache root {}", root.display()), e)
        })?;

        let mut namespaces = HashMap::new();
        let mut entries = fs::read_dir(&root).await.map_err(|e| {
            SamulatorError::io(format!("reading cache root {}", root.display()), e)
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SamulatorError::io("reading cache entry", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| SamulatorError::io("reading cache entry type", e))?;
            if !file_type.is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let index = load_index(&entry.path()).await?;
            namespaces.insert(name, index);
        }

        debug!(
            "Opened cache at {} with {} namespace(s)",
            root.display(),
            namespaces.len()
        );

        Ok(Self {
            root,
            namespaces: RwLock::new(namespaces),
        })
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up the stored binary for `namespace` at `version`
    pub async fn get(&self, namespace: &str, version: &str) -> SamulatorResult<PathBuf> {
        let namespaces = self.namespaces.read().await;

        let index = namespaces
            .get(namespace)
            .ok_or_else(|| SamulatorError::NoSuchNamespace(namespace.to_string()))?;

        index
            .get(version)
            .cloned()
            .ok_or_else(|| SamulatorError::NoSuchVersion {
                namespace: namespace.to_string(),
                version: version.to_string(),
            })
    }

    /// Copy `source` into the cache as `namespace` at `version`
    ///
    /// The source file is left in place. If the index can't be persisted
    /// the entry is rolled back and the copied file removed, so the cache
    /// never claims something it would lose on restart.
    pub async fn cache(
        &self,
        namespace: &str,
        version: &str,
        source: &Path,
    ) -> SamulatorResult<PathBuf> {
        validate_namespace(namespace)?;

        let meta = fs::metadata(source).await.map_err(|e| {
            SamulatorError::io(format!("reading cache source {}", source.display()), e)
        })?;
        if !meta.is_file() {
            return Err(SamulatorError::ArtifactNotRegularFile(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| SamulatorError::ArtifactNotRegularFile(source.to_path_buf()))?;

        let namespace_dir = self.root.join(namespace);
        let created_dir = !namespace_dir.exists();
        fs::create_dir_all(&namespace_dir).await.map_err(|e| {
            SamulatorError::io(format!("creating namespace {}", namespace_dir.display()), e)
        })?;

        let dest = namespace_dir.join(file_name);
        if let Err(e) = copy_artifact(source, &dest).await {
            if created_dir {
                // Only succeeds while empty; an index-less namespace would break the next open
                let _ = fs::remove_dir(&namespace_dir).await;
            }
            return Err(e);
        }

        let mut namespaces = self.namespaces.write().await;
        let index = namespaces.entry(namespace.to_string()).or_default();
        let previous = index.insert(version.to_string(), dest.clone());

        if let Err(e) = write_index(&namespace_dir, index).await {
            warn!("Failed updating cache index for {}: {}", namespace, e);
            match previous {
                Some(path) => {
                    index.insert(version.to_string(), path);
                }
                None => {
                    index.remove(version);
                }
            }
            let _ = fs::remove_file(&dest).await;
            let _ = fs::remove_file(tmp_index_path(&namespace_dir)).await;
            if index.is_empty() {
                namespaces.remove(namespace);
                // Nothing left to index; a bare directory would fail the next open
                if let Err(e) = fs::remove_dir_all(&namespace_dir).await {
                    warn!("Failed removing namespace {}: {}", namespace_dir.display(), e);
                }
            }
            return Err(e);
        }

        info!(
            "Updated cache index with {}@{} at {}",
            namespace,
            version,
            dest.display()
        );
        Ok(dest)
    }

    /// All cached artifacts, sorted by namespace then version
    pub async fn list(&self) -> Vec<CachedArtifact> {
        let namespaces = self.namespaces.read().await;
        let mut artifacts: Vec<CachedArtifact> = namespaces
            .iter()
            .flat_map(|(namespace, index)| {
                index.iter().map(move |(version, path)| CachedArtifact {
                    namespace: namespace.clone(),
                    version: version.clone(),
                    path: path.clone(),
                })
            })
            .collect();
        artifacts.sort_by(|a, b| {
            a.namespace
                .cmp(&b.namespace)
                .then_with(|| a.version.cmp(&b.version))
        });
        artifacts
    }
}

/// Namespaces become directory names, so they must be a single plain component
fn validate_namespace(namespace: &str) -> SamulatorResult<()> {
    let mut components = Path::new(namespace).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(SamulatorError::InvalidNamespace(namespace.to_string())),
    }
}

/// Byte-for-byte copy that refuses to replace an existing destination
async fn copy_artifact(source: &Path, dest: &Path) -> SamulatorResult<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(ARTIFACT_MODE);

    let mut dest_file = match options.open(dest).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(SamulatorError::ArtifactExists(dest.to_path_buf()));
        }
        Err(e) => {
            return Err(SamulatorError::io(
                format!("creating cached binary {}", dest.display()),
                e,
            ))
        }
    };

    let result = async {
        let mut source_file = fs::File::open(source).await?;
        tokio::io::copy(&mut source_file, &mut dest_file).await?;
        dest_file.flush().await?;
        dest_file.sync_all().await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dest, std::fs::Permissions::from_mode(ARTIFACT_MODE)).await?;
        }
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = result {
        drop(dest_file);
        let _ = fs::remove_file(dest).await;
        return Err(SamulatorError::io(
            format!("caching binary {} -> {}", source.display(), dest.display()),
            e,
        ));
    }

    Ok(())
}
