//! Configuration schema for Samulator
//!
//! Configuration is stored at `~/.config/samulator/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Artifact cache settings
    pub cache: CacheConfig,

    /// Build pipeline settings
    pub build: BuildConfig,

    /// Node runner settings
    pub runner: RunnerConfig,

    /// Nodes started by `simulate` in addition to command-line nodes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory
    pub root: PathBuf,

    /// Namespace the daemon binaries are cached under
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: project_dir().join("cache"),
            namespace: "openbazaard".to_string(),
        }
    }
}

/// Build pipeline configuration
///
/// `args` may contain `{version}`, `{label}` (the version made safe for
/// file names), `{workdir}` and `{artifact}` placeholders. In `artifact`,
/// `{version}` expands to the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Program that produces the daemon binary
    pub program: String,

    /// Arguments passed to the build program
    pub args: Vec<String>,

    /// Artifact path relative to the work directory
    pub artifact: String,

    /// Parent directory for per-build work directories
    pub work_root: PathBuf,

    /// Keep work directories after a successful build
    pub keep_workdir: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: "./scripts/build-daemon.sh".to_string(),
            args: vec![
                "{version}".to_string(),
                "{workdir}".to_string(),
                "{artifact}".to_string(),
            ],
            artifact: "dest/openbazaard_{version}".to_string(),
            work_root: project_dir().join("build"),
            keep_workdir: false,
        }
    }
}

/// Node runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Name of the JSON config file inside a node's data directory
    pub config_file: String,

    /// Where state transaction snapshots are written
    pub scratch_root: PathBuf,

    /// Pause after a node's cleanup before it counts as stopped
    pub settle_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            config_file: "config".to_string(),
            scratch_root: project_dir().join("tmp"),
            settle_delay_ms: 1000,
        }
    }
}

/// A node declared in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node label, used as the log prefix
    pub label: String,

    /// Version to build and run
    pub version: Option<String>,

    /// Node data directory
    pub data_path: Option<PathBuf>,

    /// Start the node on testnet
    pub testnet: bool,

    /// Extra arguments passed to `start`
    pub args: Vec<String>,

    /// Environment overrides for the node process
    pub env: BTreeMap<String, String>,

    /// Dotted config keys applied to the node config before start
    pub config: BTreeMap<String, toml::Value>,
}

/// `~/.samulator`, or the working directory when no home is known
fn project_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".samulator")
}
