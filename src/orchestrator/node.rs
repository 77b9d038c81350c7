//! Node descriptors

use crate::config::NodeConfig;
use crate::error::{SamulatorError, SamulatorResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One logical participant in a multi-node run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSpec {
    /// Label used in logs and errors, e.g. "buyer"
    pub label: String,

    /// Version to resolve through the artifact cache
    pub version: Option<String>,

    /// Node data directory
    pub data_path: Option<PathBuf>,

    pub testnet: bool,

    /// Pass-through arguments for `start`
    pub args: Vec<String>,

    /// Environment overrides, e.g. port remapping for parallel runs
    pub env: BTreeMap<String, String>,

    /// Dotted config keys set before the node starts
    pub config: BTreeMap<String, Value>,
}

impl NodeSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn testnet(mut self, enabled: bool) -> Self {
        self.testnet = enabled;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn config_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }
}

impl TryFrom<&NodeConfig> for NodeSpec {
    type Error = SamulatorError;

    fn try_from(node: &NodeConfig) -> SamulatorResult<Self> {
        let config = node
            .config
            .iter()
            .map(|(key, value)| -> SamulatorResult<(String, Value)> {
                Ok((key.clone(), serde_json::to_value(value)?))
            })
            .collect::<SamulatorResult<BTreeMap<_, _>>>()?;

        Ok(Self {
            label: node.label.clone(),
            version: node.version.clone(),
            data_path: node.data_path.clone(),
            testnet: node.testnet,
            args: node.args.clone(),
            env: node.env.clone(),
            config,
        })
    }
}
