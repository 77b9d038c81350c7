//! Process runner for a single daemon instance
//!
//! A [`NodeRunner`] owns one binary and at most one live subprocess of
//! it. It tracks the node lifecycle:
//!
//! | State | Meaning |
//! |-------|---------|
//! | Ready | Initial state, and the state after a kill |
//! | Initialized | A data directory exists for the node |
//! | Running | A `start` subprocess is active |
//!
//! `Initialized` is optional: a runner may go straight to `Running`.

pub mod args;
pub mod json_path;
pub mod output;
pub mod snapshot;

pub use args::{filter_args, StartOptions};
pub use output::NodeOutput;

use crate::config::RunnerConfig;
use crate::error::{SamulatorError, SamulatorResult};
use output::{output_tail, OutputTee};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::fs;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Subcommand that prepares a data directory
const INIT_SUBCOMMAND: &str = "init";
/// Subcommand that runs the daemon
const START_SUBCOMMAND: &str = "start";
/// Verbose flag passed to `init` and `start`
const VERBOSE_FLAG: &str = "-v";
/// Top-level flag that prints the daemon version
const VERSION_FLAG: &str = "-v";
const DATA_PATH_FLAG: &str = "-d";
const TESTNET_FLAG: &str = "-t";

/// Lifecycle state of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunnerState {
    Ready,
    Initialized,
    Running,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Initialized => "initialized",
            Self::Running => "running",
        };
        write!(f, "{}", name)
    }
}

/// Controls one instance of the daemon binary
pub struct NodeRunner {
    binary_path: PathBuf,
    state: RunnerState,

    data_path: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    testnet: bool,
    additional_args: Vec<String>,
    env: BTreeMap<String, String>,

    config_file: String,
    scratch_root: PathBuf,

    child: Option<Child>,
    tee: Option<OutputTee>,
    last_exit: Option<ExitStatus>,
}

impl NodeRunner {
    /// Create a runner for the binary at `path`
    pub fn from_binary_path(path: impl Into<PathBuf>) -> SamulatorResult<Self> {
        Self::with_config(path, &RunnerConfig::default())
    }

    /// Create a runner for the binary at `path` using explicit settings
    pub fn with_config(path: impl Into<PathBuf>, config: &RunnerConfig) -> SamulatorResult<Self> {
        let binary_path = path.into();
        if !binary_path.exists() {
            return Err(SamulatorError::BinaryNotFound(binary_path));
        }

        Ok(Self {
            binary_path,
            state: RunnerState::Ready,
            data_path: None,
            snapshot_path: None,
            testnet: false,
            additional_args: Vec::new(),
            env: BTreeMap::new(),
            config_file: config.config_file.clone(),
            scratch_root: config.scratch_root.clone(),
            child: None,
            tee: None,
            last_exit: None,
        })
    }

    /// Binary this runner launches
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Node data directory, if one was set
    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }

    /// Whether the node starts on testnet
    pub fn testnet(&self) -> bool {
        self.testnet
    }

    /// Arguments passed through to `start`
    pub fn additional_args(&self) -> &[String] {
        &self.additional_args
    }

    /// Location of the last state snapshot
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Exit status of the last subprocess that ran to completion
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.last_exit
    }

    /// Use the node state found at `path`
    ///
    /// An existing directory means an existing node is being resumed.
    pub fn set_custom_data_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        if path.exists() && self.state < RunnerState::Initialized {
            self.state = RunnerState::Initialized;
        }
        self.data_path = Some(path);
        self
    }

    /// Start the node on testnet
    pub fn set_testnet_mode(&mut self, enabled: bool) -> &mut Self {
        self.testnet = enabled;
        self
    }

    /// Set an environment variable for every subprocess of this node
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Apply `-d`/`-t` style flags from `args` and keep the rest for `start`
    pub fn with_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let (options, remaining) = filter_args(&args);

        if options.testnet {
            self.set_testnet_mode(true);
        }
        if let Some(path) = options.data_path {
            self.set_custom_data_path(path);
        }
        self.additional_args = remaining;
        self
    }

    /// Set the dotted `key` in the node's JSON config to `value`
    ///
    /// Requires an initialized node. The file keeps its permission bits.
    pub async fn set_config_value(&self, key: &str, value: Value) -> SamulatorResult<()> {
        if self.state < RunnerState::Initialized {
            return Err(SamulatorError::NotInitialized);
        }
        let data_path = self.data_path.as_ref().ok_or(SamulatorError::NoDataPath)?;
        let config_path = data_path.join(&self.config_file);

        let meta = match fs::metadata(&config_path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SamulatorError::NodeConfigNotFound(config_path));
            }
            Err(e) => {
                return Err(SamulatorError::io(
                    format!("reading node config {}", config_path.display()),
                    e,
                ))
            }
        };

        let raw = fs::read_to_string(&config_path).await.map_err(|e| {
            SamulatorError::io(format!("reading node config {}", config_path.display()), e)
        })?;
        let mut config: Value = serde_json::from_str(&raw)?;

        json_path::set_path(&mut config, key, value).map_err(|e| SamulatorError::ConfigPath {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let updated = if raw.contains('\n') {
            serde_json::to_string_pretty(&config)?
        } else {
            serde_json::to_string(&config)?
        };
        fs::write(&config_path, updated).await.map_err(|e| {
            SamulatorError::io(format!("writing node config {}", config_path.display()), e)
        })?;
        fs::set_permissions(&config_path, meta.permissions())
            .await
            .map_err(|e| {
                SamulatorError::io(
                    format!("restoring permissions on {}", config_path.display()),
                    e,
                )
            })?;

        debug!("Set {} in {}", key, config_path.display());
        Ok(())
    }

    /// Snapshot the node's data directory before a risky change
    ///
    /// Returns the snapshot location, which is also kept on the runner.
    pub async fn begin_node_state_transaction(&mut self) -> SamulatorResult<PathBuf> {
        if self.state == RunnerState::Running {
            return Err(SamulatorError::TransactionWhileRunning);
        }
        let data_path = self.data_path.clone().ok_or(SamulatorError::NoDataPath)?;

        fs::create_dir_all(&self.scratch_root).await.map_err(|e| {
            SamulatorError::io(
                format!("creating scratch directory {}", self.scratch_root.display()),
                e,
            )
        })?;
        let snapshot = snapshot::generate_snapshot_path(&self.scratch_root, "state");

        let (src, dst) = (data_path.clone(), snapshot.clone());
        let copied = tokio::task::spawn_blocking(move || snapshot::copy_dir_recursive(&src, &dst))
            .await
            .map_err(|e| SamulatorError::Internal(format!("snapshot task failed: {}", e)))
            .and_then(|result| result);
        if let Err(e) = copied {
            if let Err(cleanup) = fs::remove_dir_all(&snapshot).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Removing partial snapshot {}: {}", snapshot.display(), cleanup);
                }
            }
            return Err(e);
        }

        info!(
            "Snapshotted node state {} to {}",
            data_path.display(),
            snapshot.display()
        );
        self.snapshot_path = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Get a reader fed with everything subsequent subprocesses print
    ///
    /// Call before starting to capture output from the beginning. The
    /// reader must be drained, or the node eventually blocks on output.
    pub fn split_output(&mut self) -> NodeOutput {
        let (tee, reader) = OutputTee::pipe();
        if let Some(previous) = self.tee.replace(tee) {
            if let Err(e) = previous.close() {
                warn!("Closing previous output pipe: {}", e);
            }
        }
        reader
    }

    /// Synchronously initialize the node's data directory
    ///
    /// No-op when already initialized.
    pub async fn init(&mut self) -> SamulatorResult<()> {
        if self.state >= RunnerState::Initialized {
            return Ok(());
        }

        let args = self.init_args();
        let command = self.describe(&args);
        info!("Initializing node: {}", command);

        let (status, output) = if self.tee.is_some() {
            let mut child = self.spawn(&args)?;
            let status = child
                .wait()
                .await
                .map_err(|e| SamulatorError::command_failed(&command, e))?;
            (status, String::new())
        } else {
            let output = self
                .command(&args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| SamulatorError::command_failed(&command, e))?;
            let tail = output_tail(
                &String::from_utf8_lossy(&output.stdout),
                &String::from_utf8_lossy(&output.stderr),
            );
            (output.status, tail)
        };

        self.last_exit = Some(status);
        if !status.success() {
            return Err(SamulatorError::ProcessExit {
                command,
                code: status.code(),
                output,
            });
        }

        self.state = RunnerState::Initialized;
        Ok(())
    }

    /// Launch the node and return immediately
    ///
    /// The node counts as running once spawned; readiness is the
    /// caller's concern.
    pub async fn async_start(&mut self) -> SamulatorResult<()> {
        if self.child.is_some() {
            return Err(SamulatorError::AlreadyRunning);
        }

        let args = self.start_args();
        info!("Starting node: {}", self.describe(&args));
        let child = self.spawn(&args)?;
        debug!("Node process id: {:?}", child.id());

        self.child = Some(child);
        self.state = RunnerState::Running;
        Ok(())
    }

    /// Run the node in the foreground until it exits
    pub async fn run_start(&mut self) -> SamulatorResult<()> {
        if self.child.is_some() {
            return Err(SamulatorError::AlreadyRunning);
        }

        let args = self.start_args();
        let command = self.describe(&args);
        info!("Running node: {}", command);

        let mut child = self.spawn(&args)?;
        let status = child
            .wait()
            .await
            .map_err(|e| SamulatorError::command_failed(&command, e))?;

        self.last_exit = Some(status);
        if status.success() {
            Ok(())
        } else {
            Err(SamulatorError::ProcessExit {
                command,
                code: status.code(),
                output: String::new(),
            })
        }
    }

    /// Force the active subprocess to stop
    pub async fn kill(&mut self) -> SamulatorResult<()> {
        self.state = RunnerState::Ready;
        let mut child = self.child.take().ok_or(SamulatorError::NoActiveProcess)?;

        child
            .kill()
            .await
            .map_err(|e| SamulatorError::io(format!("killing {}", self.binary_path.display()), e))?;
        info!("Killed node {}", self.binary_path.display());
        Ok(())
    }

    /// Release everything the runner holds
    ///
    /// Kills the active subprocess, if any, and closes the output pipe.
    /// Both steps always run; their failures are reported together.
    pub async fn cleanup(&mut self) -> SamulatorResult<()> {
        let mut failures = Vec::new();

        if self.child.is_some() {
            if let Err(e) = self.kill().await {
                failures.push(format!("process: {}", e));
            }
        }
        if let Some(tee) = self.tee.take() {
            if let Err(e) = tee.close() {
                failures.push(format!("output pipe: {}", e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SamulatorError::Cleanup(failures))
        }
    }

    /// Version string reported by the binary
    pub async fn version(&self) -> SamulatorResult<String> {
        let args = vec![VERSION_FLAG.to_string()];
        let command = self.describe(&args);

        let output = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SamulatorError::command_failed(&command, e))?;

        if !output.status.success() {
            return Err(SamulatorError::ProcessExit {
                command,
                code: output.status.code(),
                output: output_tail(
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr),
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Arguments for the `init` subcommand
    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec![INIT_SUBCOMMAND.to_string(), VERBOSE_FLAG.to_string()];
        self.push_node_flags(&mut args);
        args
    }

    /// Arguments for the `start` subcommand
    pub fn start_args(&self) -> Vec<String> {
        let mut args = vec![START_SUBCOMMAND.to_string(), VERBOSE_FLAG.to_string()];
        self.push_node_flags(&mut args);
        args.extend(self.additional_args.iter().cloned());
        args
    }

    fn push_node_flags(&self, args: &mut Vec<String>) {
        if let Some(path) = &self.data_path {
            args.push(DATA_PATH_FLAG.to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        if self.testnet {
            args.push(TESTNET_FLAG.to_string());
        }
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.binary_path.display(), args.join(" "))
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn with output wired to the tee when one was requested
    fn spawn(&mut self, args: &[String]) -> SamulatorResult<Child> {
        let command = self.describe(args);
        let mut cmd = self.command(args);

        if self.tee.is_some() {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SamulatorError::command_failed(command, e))?;

        if let Some(tee) = self.tee.as_mut() {
            if let Some(stdout) = child.stdout.take() {
                tee.attach(stdout);
            }
            if let Some(stderr) = child.stderr.take() {
                tee.attach(stderr);
            }
        }
        Ok(child)
    }
}
