//! External-command build pipeline
//!
//! Runs a configured program inside a fresh work directory and picks the
//! produced binary up from a known relative path.

use crate::build::{BuildPipeline, BuiltArtifact};
use crate::config::BuildConfig;
use crate::error::{SamulatorError, SamulatorResult};
use crate::runner::output::output_tail;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

/// Build pipeline backed by an external build command
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    artifact: String,
    work_root: PathBuf,
}

impl CommandPipeline {
    /// Create a pipeline from build configuration
    pub fn new(config: &BuildConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            artifact: config.artifact.clone(),
            work_root: config.work_root.clone(),
        }
    }

    /// Fresh, labelled work directory for one build of `version`
    fn generate_workdir(&self, version: &str) -> PathBuf {
        self.work_root.join(format!(
            "samulator_build_{}_{}",
            version_label(version),
            Uuid::new_v4().simple()
        ))
    }

    /// Where the build of `version` in `workdir` must leave its binary
    ///
    /// `{version}` expands to the path-safe label here, so refs such as
    /// `feature/eth` never nest directories or collide on file name.
    fn artifact_path(&self, version: &str, workdir: &Path) -> PathBuf {
        let label = version_label(version);
        workdir.join(
            self.artifact
                .replace("{version}", &label)
                .replace("{label}", &label)
                .replace("{workdir}", &workdir.to_string_lossy()),
        )
    }
}

/// Version reduced to characters safe in a single file name
fn version_label(version: &str) -> String {
    version
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Substitute `{version}`, `{label}`, `{workdir}` and `{artifact}` in a build argument
fn expand(template: &str, version: &str, workdir: &Path, artifact: &Path) -> String {
    template
        .replace("{version}", version)
        .replace("{label}", &version_label(version))
        .replace("{workdir}", &workdir.to_string_lossy())
        .replace("{artifact}", &artifact.to_string_lossy())
}

#[async_trait]
impl BuildPipeline for CommandPipeline {
    async fn build(&self, version: &str) -> SamulatorResult<BuiltArtifact> {
        let workdir = self.generate_workdir(version);
        fs::create_dir_all(&workdir).await.map_err(|e| {
            SamulatorError::io(format!("creating build directory {}", workdir.display()), e)
        })?;
        info!("Building {} at {}", version, workdir.display());

        let path = self.artifact_path(version, &workdir);
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| expand(arg, version, &workdir, &path))
            .collect();
        debug!("Executing: {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SamulatorError::command_failed(&self.program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(SamulatorError::Build {
                version: version.to_string(),
                reason: format!(
                    "{} exited with {}\n{}",
                    self.program,
                    output.status,
                    output_tail(&stdout, &stderr)
                ),
            });
        }

        if !path.is_file() {
            return Err(SamulatorError::Build {
                version: version.to_string(),
                reason: format!("expected artifact missing at {}", path.display()),
            });
        }

        Ok(BuiltArtifact {
            path,
            workdir: Some(workdir),
        })
    }

    async fn cleanup(&self, artifact: &BuiltArtifact) -> SamulatorResult<()> {
        if let Some(workdir) = &artifact.workdir {
            fs::remove_dir_all(workdir).await.map_err(|e| {
                SamulatorError::io(format!("cleaning build directory {}", workdir.display()), e)
            })?;
        }
        Ok(())
    }

    fn pipeline_name(&self) -> &'static str {
        "build command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ArtifactResolver;
    use crate::cache::ArtifactCache;
    use serial_test::serial;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn shell_pipeline(work_root: &Path, script: &str) -> CommandPipeline {
        CommandPipeline::new(&BuildConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            artifact: "dest/openbazaard_{version}".to_string(),
            work_root: work_root.to_path_buf(),
            keep_workdir: false,
        })
    }

    #[test]
    fn expand_placeholders() {
        let expanded = expand(
            "{workdir}/out-{version}:{label}:{artifact}",
            "feature/v1.2",
            Path::new("/tmp/w"),
            Path::new("/tmp/w/dest/bin"),
        );
        assert_eq!(expanded, "/tmp/w/out-feature/v1.2:feature_v1_2:/tmp/w/dest/bin");
    }

    #[test]
    fn workdir_label_is_path_safe() {
        let pipeline = shell_pipeline(Path::new("/work"), "true");
        let dir = pipeline.generate_workdir("feature/eth-master");
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();

        assert_eq!(dir.parent().unwrap(), Path::new("/work"));
        assert!(name.starts_with("samulator_build_feature_eth-master_"));
    }

    #[test]
    fn artifact_name_is_path_safe() {
        let pipeline = shell_pipeline(Path::new("/work"), "true");
        let workdir = Path::new("/work/b");

        let feature = pipeline.artifact_path("feature/eth", workdir);
        let bugfix = pipeline.artifact_path("bugfix/eth", workdir);

        assert_eq!(feature, Path::new("/work/b/dest/openbazaard_feature_eth"));
        assert_ne!(feature.file_name(), bugfix.file_name());
    }

    #[tokio::test]
    #[serial]
    async fn slashed_versions_cache_side_by_side() {
        let root = TempDir::new().unwrap();
        let cache = ArtifactCache::open_or_create(root.path().join("cache"))
            .await
            .unwrap();
        let pipeline = CommandPipeline::new(&BuildConfig {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "mkdir -p \"$(dirname \"$1\")\" && printf %s \"$2\" > \"$1\"".to_string(),
                "build".to_string(),
                "{artifact}".to_string(),
                "{version}".to_string(),
            ],
            artifact: "dest/openbazaard_{version}".to_string(),
            work_root: root.path().join("build"),
            keep_workdir: false,
        });
        let resolver = ArtifactResolver::new(Arc::new(cache), Arc::new(pipeline), "openbazaard");

        let feature = resolver.resolve("feature/eth").await.unwrap();
        let bugfix = resolver.resolve("bugfix/eth").await.unwrap();

        assert_ne!(feature, bugfix);
        assert_eq!(std::fs::read(&feature).unwrap(), b"feature/eth");
        assert_eq!(std::fs::read(&bugfix).unwrap(), b"bugfix/eth");
    }

    #[tokio::test]
    #[serial]
    async fn builds_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let pipeline = shell_pipeline(
            root.path(),
            "mkdir -p dest && printf built > dest/openbazaard_{version}",
        );

        let artifact = pipeline.build("v7").await.unwrap();
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"built");

        let workdir = artifact.workdir.clone().unwrap();
        assert!(workdir.starts_with(root.path()));
        pipeline.cleanup(&artifact).await.unwrap();
        assert!(!workdir.exists());
    }

    #[tokio::test]
    #[serial]
    async fn non_zero_exit_is_build_error_with_output() {
        let root = TempDir::new().unwrap();
        let pipeline = shell_pipeline(root.path(), "echo checkout failed >&2; exit 3");

        let err = pipeline.build("v1").await.unwrap_err();
        match err {
            SamulatorError::Build { version, reason } => {
                assert_eq!(version, "v1");
                assert!(reason.contains("checkout failed"));
            }
            other => panic!("expected Build error, got {other:?}"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn missing_artifact_is_build_error() {
        let root = TempDir::new().unwrap();
        let pipeline = shell_pipeline(root.path(), "true");

        let err = pipeline.build("v1").await.unwrap_err();
        assert!(err.to_string().contains("expected artifact missing"));
    }
}
