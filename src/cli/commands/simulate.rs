//! Simulate command - run several nodes until interrupted

use crate::cli::args::SimulateArgs;
use crate::cli::shutdown_signal;
use crate::config::Config;
use crate::error::{SamulatorError, SamulatorResult};
use crate::orchestrator::{NodeSpec, Orchestrator};
use crate::ui::{self, UiContext};
use std::sync::Arc;

/// Execute the simulate command
pub async fn execute(args: SimulateArgs, config: &Config) -> SamulatorResult<()> {
    let ctx = UiContext::detect();
    let nodes = collect_nodes(&args, config)?;
    if nodes.is_empty() {
        return Err(SamulatorError::NoNodesConfigured);
    }

    let resolver = Arc::new(super::open_resolver(config).await?);
    let orchestrator = Orchestrator::new(resolver, config.runner.clone());

    let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
    ui::step_info(
        &ctx,
        &format!("Starting {} (Ctrl-C to stop)", labels.join(", ")),
    );

    orchestrator.run(nodes, shutdown_signal()).await?;

    ui::step_ok(&ctx, "All nodes stopped");
    Ok(())
}

/// Command-line nodes first, then `[[nodes]]` from the config file
fn collect_nodes(args: &SimulateArgs, config: &Config) -> SamulatorResult<Vec<NodeSpec>> {
    let cli_nodes = [
        ("buyer", &args.buyer, &args.buyer_version),
        ("vendor", &args.vendor, &args.vendor_version),
        ("moderator", &args.moderator, &args.moderator_version),
    ];

    let mut nodes = Vec::new();
    for (label, path, version) in cli_nodes {
        if let Some(path) = path {
            let mut spec = NodeSpec::new(label).data_path(path).testnet(args.testnet);
            spec.version = version.clone();
            nodes.push(spec);
        }
    }

    for (i, node) in config.nodes.iter().enumerate() {
        let mut spec = NodeSpec::try_from(node)?;
        if spec.label.is_empty() {
            spec.label = format!("node{}", i + 1);
        }
        nodes.push(spec);
    }

    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use crate::config::NodeConfig;
    use clap::Parser;
    use std::path::PathBuf;

    fn simulate_args(argv: &[&str]) -> SimulateArgs {
        let mut full = vec!["samulator", "simulate"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Simulate(args) => args,
            _ => panic!("expected Simulate command"),
        }
    }

    #[test]
    fn no_nodes_anywhere() {
        let nodes = collect_nodes(&simulate_args(&[]), &Config::default()).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn command_line_nodes_in_fixed_order() {
        let args = simulate_args(&[
            "--moderator",
            "/tmp/mod",
            "--buyer",
            "/tmp/buyer",
            "--buyer-version",
            "abc123",
            "--testnet",
        ]);

        let nodes = collect_nodes(&args, &Config::default()).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].label, "buyer");
        assert_eq!(nodes[0].version.as_deref(), Some("abc123"));
        assert_eq!(nodes[0].data_path, Some(PathBuf::from("/tmp/buyer")));
        assert!(nodes[0].testnet);
        assert_eq!(nodes[1].label, "moderator");
        assert_eq!(nodes[1].version, None);
    }

    #[test]
    fn config_nodes_are_appended() {
        let mut config = Config::default();
        config.nodes.push(NodeConfig {
            label: "relay".to_string(),
            version: Some("v0.13.8".to_string()),
            ..NodeConfig::default()
        });
        config.nodes.push(NodeConfig::default());

        let nodes = collect_nodes(&simulate_args(&["-b", "/tmp/buyer"]), &config).unwrap();

        let labels: Vec<&str> = nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["buyer", "relay", "node2"]);
        assert!(!nodes[1].testnet);
    }
}
