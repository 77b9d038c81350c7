//! Error types for Samulator
//!
//! All modules use `SamulatorResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Samulator operations
pub type SamulatorResult<T> = Result<T, SamulatorError>;

/// Exit code when no node config paths were supplied
pub const EXIT_NO_NODES: u8 = 3;
/// Exit code when a node has no version to build
pub const EXIT_NO_VERSION: u8 = 4;
/// Exit code when a node failed to build or start
pub const EXIT_NODE_START: u8 = 2;

/// All errors that can occur in Samulator
#[derive(Error, Debug)]
pub enum SamulatorError {
    // Cache errors
    #[error("Cache namespace not found: {0}")]
    NoSuchNamespace(String),

    #[error("Cached version not found: {namespace}@{version}")]
    NoSuchVersion { namespace: String, version: String },

    #[error("Failed to read cache index {path}: {source}")]
    CacheIndexRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse cache index {path}: {source}")]
    CacheIndexParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write cache index {path}: {reason}")]
    CacheIndexWrite { path: PathBuf, reason: String },

    #[error("Cache source is not a regular file: {0}")]
    ArtifactNotRegularFile(PathBuf),

    #[error("Cached destination already exists: {0}")]
    ArtifactExists(PathBuf),

    #[error("Invalid cache namespace: {0:?}")]
    InvalidNamespace(String),

    // Build errors
    #[error("Build of version {version} failed: {reason}")]
    Build { version: String, reason: String },

    // Runner errors
    #[error("Binary not found: {0}")]
    BinaryNotFound(PathBuf),

    #[error("Node must be initialized before setting config values")]
    NotInitialized,

    #[error("State transaction cannot begin while the node is running")]
    TransactionWhileRunning,

    #[error("No active node process")]
    NoActiveProcess,

    #[error("Node is already running")]
    AlreadyRunning,

    #[error("No data path set for node")]
    NoDataPath,

    #[error("Node config not found: {0}")]
    NodeConfigNotFound(PathBuf),

    #[error("Cannot set config key {key}: {reason}")]
    ConfigPath { key: String, reason: String },

    #[error("Command exited unsuccessfully ({}): {command}{}", exit_label(.code), output_suffix(.output))]
    ProcessExit {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Cleanup failed: {}", .0.join("; "))]
    Cleanup(Vec<String>),

    // Orchestration errors
    #[error("No node config paths provided")]
    NoNodesConfigured,

    #[error("No version provided for node {0}")]
    MissingVersion(String),

    #[error("Node {label} failed to start: {source}")]
    NodeStart {
        label: String,
        #[source]
        source: Box<SamulatorError>,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn output_suffix(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!("\n{}", output)
    }
}

impl SamulatorError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether this error means the cache simply doesn't hold the artifact yet
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::NoSuchNamespace(_) | Self::NoSuchVersion { .. })
    }

    /// Process exit code for this error class
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NoNodesConfigured => EXIT_NO_NODES,
            Self::MissingVersion(_) => EXIT_NO_VERSION,
            Self::NodeStart { .. } => EXIT_NODE_START,
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::NoNodesConfigured => {
                Some("Pass --buyer, --vendor or --moderator, or add [[nodes]] to the config")
            }
            Self::MissingVersion(_) => Some("Pass --<node>-version or set the node's version"),
            Self::CacheIndexParse { .. } | Self::CacheIndexRead { .. } => {
                Some("Remove the broken namespace directory from the cache root")
            }
            Self::NotInitialized => Some("Point the node at an existing data path or run init first"),
            _ => None,
        }
    }
}
