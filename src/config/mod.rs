//! Configuration loading
//!
//! The config file is optional. Relative paths inside it are resolved
//! against the file's own directory, so a project-local config behaves
//! the same from any working directory. Values are checked on load,
//! before any command touches the cache or spawns a build.

pub mod schema;

pub use schema::{BuildConfig, CacheConfig, Config, NodeConfig, RunnerConfig};

use crate::error::{SamulatorError, SamulatorResult};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Locates, loads and initializes the config file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for `path`, or for the per-user location when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            config_path: path.unwrap_or_else(Self::default_config_path),
        }
    }

    /// `<config dir>/samulator/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("samulator")
            .join("config.toml")
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Load and check the configuration
    ///
    /// A missing file yields the defaults.
    pub async fn load(&self) -> SamulatorResult<(Config, ConfigSource)> {
        if !self.config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok((Config::default(), ConfigSource::Defaults));
        }

        let content = fs::read_to_string(&self.config_path).await.map_err(|e| {
            SamulatorError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| self.invalid(e))?;

        if let Some(base) = self.config_path.parent() {
            anchor_paths(&mut config, base);
        }
        check(&config).map_err(|reason| self.invalid(reason))?;

        Ok((config, ConfigSource::File(self.config_path.clone())))
    }

    /// Write the default configuration
    ///
    /// Returns `false` without touching an existing file unless `force`.
    pub async fn write_defaults(&self, force: bool) -> SamulatorResult<bool> {
        if self.config_path.exists() && !force {
            return Ok(false);
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SamulatorError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let content = toml::to_string_pretty(&Config::default())?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SamulatorError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Default configuration written to {}", self.config_path.display());
        Ok(true)
    }

    fn invalid(&self, reason: impl ToString) -> SamulatorError {
        SamulatorError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Resolve every relative path in `config` against `base`
fn anchor_paths(config: &mut Config, base: &Path) {
    let anchor = |path: &mut PathBuf| {
        if path.is_relative() {
            *path = base.join(&*path);
        }
    };

    anchor(&mut config.cache.root);
    anchor(&mut config.build.work_root);
    anchor(&mut config.runner.scratch_root);
    for node in &mut config.nodes {
        if let Some(path) = node.data_path.as_mut() {
            anchor(path);
        }
    }
}

/// Reject values that would only fail later, mid-build or mid-run
fn check(config: &Config) -> Result<(), String> {
    if !matches!(config.general.log_format.as_str(), "text" | "json") {
        return Err(format!(
            "general.log_format must be \"text\" or \"json\", got {:?}",
            config.general.log_format
        ));
    }
    if !is_single_component(&config.cache.namespace) {
        return Err(format!(
            "cache.namespace must be a plain directory name, got {:?}",
            config.cache.namespace
        ));
    }
    if config.build.program.trim().is_empty() {
        return Err("build.program is empty".to_string());
    }
    let artifact = Path::new(&config.build.artifact);
    if config.build.artifact.is_empty()
        || artifact
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(format!(
            "build.artifact must be a path inside the work directory, got {:?}",
            config.build.artifact
        ));
    }
    if !is_single_component(&config.runner.config_file) {
        return Err(format!(
            "runner.config_file must be a file name, got {:?}",
            config.runner.config_file
        ));
    }

    let mut labels = HashSet::new();
    for node in config.nodes.iter().filter(|n| !n.label.is_empty()) {
        if !labels.insert(node.label.as_str()) {
            return Err(format!("node label {:?} is used twice", node.label));
        }
    }
    Ok(())
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_with(dir: &TempDir, content: &str) -> ConfigManager {
        let path = dir.path().join("samulator.toml");
        std::fs::write(&path, content).unwrap();
        ConfigManager::new(Some(path))
    }

    #[tokio::test]
    async fn missing_file_means_defaults() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::new(Some(temp.path().join("nonexistent.toml")));

        let (config, source) = manager.load().await.unwrap();
        assert_eq!(config.cache.namespace, "openbazaard");
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[tokio::test]
    async fn relative_paths_follow_the_config_file() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(
            &temp,
            r#"
            [cache]
            root = "cache"

            [build]
            work_root = "/var/tmp/builds"

            [[nodes]]
            label = "buyer"
            data_path = "nodes/buyer"
            "#,
        );

        let (config, source) = manager.load().await.unwrap();

        assert_eq!(source, ConfigSource::File(manager.path().to_path_buf()));
        assert_eq!(config.cache.root, temp.path().join("cache"));
        assert_eq!(config.build.work_root, PathBuf::from("/var/tmp/builds"));
        assert_eq!(
            config.nodes[0].data_path.as_deref(),
            Some(temp.path().join("nodes/buyer").as_path())
        );
    }

    #[tokio::test]
    async fn write_defaults_then_load() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::new(Some(temp.path().join("nested").join("config.toml")));

        assert!(manager.write_defaults(false).await.unwrap());
        assert!(!manager.write_defaults(false).await.unwrap());
        assert!(manager.write_defaults(true).await.unwrap());

        let (config, _) = manager.load().await.unwrap();
        assert_eq!(config.runner.settle_delay_ms, 1000);
    }

    #[tokio::test]
    async fn syntax_error_reports_path() {
        let temp = TempDir::new().unwrap();
        let manager = manager_with(&temp, "[cache\nroot = 1");

        match manager.load().await.unwrap_err() {
            SamulatorError::ConfigInvalid { path, .. } => assert_eq!(path, manager.path()),
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_values_that_fail_later() {
        let cases = [
            ("[general]\nlog_format = \"xml\"", "log_format"),
            ("[cache]\nnamespace = \"a/b\"", "cache.namespace"),
            ("[build]\nprogram = \" \"", "build.program"),
            ("[build]\nartifact = \"../outside\"", "build.artifact"),
            ("[build]\nartifact = \"/usr/bin/daemon\"", "build.artifact"),
            ("[runner]\nconfig_file = \"\"", "runner.config_file"),
            (
                "[[nodes]]\nlabel = \"buyer\"\n[[nodes]]\nlabel = \"buyer\"",
                "used twice",
            ),
        ];

        for (content, expected) in cases {
            let temp = TempDir::new().unwrap();
            let err = manager_with(&temp, content).load().await.unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "{content:?} gave {err}"
            );
        }
    }
}
