//! Multi-node orchestration
//!
//! Every node is resolved, configured and started on its own task. Each
//! started node leaves a teardown closure in a shared [`CleanupRegistry`].
//! When the shutdown future resolves, all closures run concurrently and
//! [`Orchestrator::run`] returns once every node has reported completion.

mod cleanup;
mod node;

pub use cleanup::CleanupRegistry;
pub use node::NodeSpec;

use crate::build::ArtifactResolver;
use crate::config::RunnerConfig;
use crate::error::{SamulatorError, SamulatorResult};
use crate::runner::{NodeOutput, NodeRunner};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, Instrument};

/// How the startup phase ended
enum Startup {
    Complete,
    Failed(SamulatorError),
    Interrupted,
}

/// Starts a set of nodes and tears them all down together
pub struct Orchestrator {
    resolver: Arc<ArtifactResolver>,
    runner_config: RunnerConfig,
    settle_delay: Duration,
}

impl Orchestrator {
    pub fn new(resolver: Arc<ArtifactResolver>, runner_config: RunnerConfig) -> Self {
        let settle_delay = Duration::from_millis(runner_config.settle_delay_ms);
        Self {
            resolver,
            runner_config,
            settle_delay,
        }
    }

    /// Pause after each node's cleanup before it counts as stopped
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Start `nodes` concurrently and keep them up until `shutdown` resolves
    ///
    /// If any node fails to start, the nodes already up are torn down and
    /// the first failure is returned.
    pub async fn run<S>(&self, nodes: Vec<NodeSpec>, shutdown: S) -> SamulatorResult<()>
    where
        S: Future<Output = ()>,
    {
        if nodes.is_empty() {
            return Err(SamulatorError::NoNodesConfigured);
        }
        if let Some(node) = nodes.iter().find(|n| n.version.is_none()) {
            return Err(SamulatorError::MissingVersion(node.label.clone()));
        }

        let registry = Arc::new(CleanupRegistry::new());
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<String>();

        let mut starting = JoinSet::new();
        let mut labels = HashMap::new();
        for spec in nodes {
            let starter = NodeStarter {
                resolver: Arc::clone(&self.resolver),
                runner_config: self.runner_config.clone(),
                settle_delay: self.settle_delay,
                registry: Arc::clone(&registry),
                done: done_tx.clone(),
            };
            let label = spec.label.clone();
            let handle = starting.spawn(async move {
                let label = spec.label.clone();
                (label, starter.start(spec).await)
            });
            labels.insert(handle.id(), label);
        }
        drop(done_tx);

        tokio::pin!(shutdown);
        let outcome = loop {
            tokio::select! {
                joined = starting.join_next() => match joined {
                    None => break Startup::Complete,
                    Some(Ok((_, Ok(())))) => {}
                    Some(Ok((label, Err(e)))) => {
                        break Startup::Failed(SamulatorError::NodeStart {
                            label,
                            source: Box::new(e),
                        });
                    }
                    Some(Err(e)) => {
                        let label = labels.remove(&e.id()).unwrap_or_default();
                        break Startup::Failed(SamulatorError::NodeStart {
                            label,
                            source: Box::new(SamulatorError::Internal(e.to_string())),
                        });
                    }
                },
                _ = &mut shutdown => break Startup::Interrupted,
            }
        };
        // Nodes still starting are dropped, which kills their processes
        starting.shutdown().await;

        match &outcome {
            Startup::Complete => {
                info!("All {} node(s) running", registry.len());
                shutdown.as_mut().await;
                info!("Interrupted, stopping nodes");
            }
            Startup::Interrupted => info!("Interrupted during startup, stopping nodes"),
            Startup::Failed(e) => error!("{}", e),
        }

        let pending = registry.invoke_all();
        let mut stopped = 0;
        while stopped < pending {
            match done_rx.recv().await {
                Some(label) => {
                    stopped += 1;
                    debug!(node = %label, "Node stopped ({}/{})", stopped, pending);
                }
                None => break,
            }
        }
        info!("Stopped {} node(s)", stopped);

        match outcome {
            Startup::Failed(e) => Err(e),
            Startup::Complete | Startup::Interrupted => Ok(()),
        }
    }
}

/// Everything one node task needs, owned by that task
struct NodeStarter {
    resolver: Arc<ArtifactResolver>,
    runner_config: RunnerConfig,
    settle_delay: Duration,
    registry: Arc<CleanupRegistry>,
    done: mpsc::UnboundedSender<String>,
}

impl NodeStarter {
    async fn start(self, spec: NodeSpec) -> SamulatorResult<()> {
        let version = spec
            .version
            .as_deref()
            .ok_or_else(|| SamulatorError::MissingVersion(spec.label.clone()))?;

        let binary = self.resolver.resolve(version).await?;
        let mut runner = NodeRunner::with_config(&binary, &self.runner_config)?;

        for (key, value) in &spec.env {
            runner.set_env(key, value);
        }
        if let Some(path) = &spec.data_path {
            runner.set_custom_data_path(path);
        }
        runner.set_testnet_mode(spec.testnet);
        runner.with_args(spec.args.iter().cloned());

        if !spec.config.is_empty() {
            runner.init().await?;
            for (key, value) in &spec.config {
                runner.set_config_value(key, value.clone()).await?;
            }
        }

        let output = runner.split_output();
        tokio::spawn(log_node_output(output, spec.label.clone()));

        runner.async_start().await?;
        info!(
            node = %spec.label,
            version,
            binary = %binary.display(),
            "Node started"
        );

        let label = spec.label.clone();
        let settle_delay = self.settle_delay;
        let done = self.done;
        self.registry.register(spec.label, move || async move {
            let mut runner = runner;
            if let Err(e) = runner.cleanup().await {
                error!(node = %label, "Cleanup failed: {}", e);
            }
            tokio::time::sleep(settle_delay).await;
            let _ = done.send(label);
        });

        Ok(())
    }
}

/// Log every line a node prints inside a span carrying its label
pub(crate) async fn log_node_output(output: NodeOutput, label: String) {
    let span = info_span!("node", node = %label);
    async move {
        let mut lines = BufReader::new(output).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!("{}", line),
                Ok(None) => break,
                Err(e) => {
                    error!("Reading node output failed: {}", e);
                    break;
                }
            }
        }
    }
    .instrument(span)
    .await
}
