//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Samulator - build, cache and run versioned daemon nodes
///
/// Builds each requested daemon version once, caches the binary, and
/// runs several nodes side by side for integration testing.
#[derive(Parser, Debug)]
#[command(name = "samulator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SAMULATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and cache a daemon version
    #[command(visible_alias = "p")]
    Prepare(PrepareArgs),

    /// Run one daemon version in the foreground
    #[command(visible_alias = "s")]
    Start(StartArgs),

    /// Run buyer, vendor and moderator nodes until interrupted
    Simulate(SimulateArgs),

    /// Inspect the artifact cache
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the prepare command
#[derive(Parser, Debug)]
pub struct PrepareArgs {
    /// Version (git reference) to build
    #[arg(id = "version_ref", value_name = "VERSION")]
    pub version: String,
}

/// Arguments for the start command
#[derive(Parser, Debug)]
pub struct StartArgs {
    /// Version (git reference) to start
    #[arg(id = "version_ref", value_name = "VERSION")]
    pub version: String,

    /// Parameters passed to the daemon's start command
    #[arg(last = true)]
    pub params: Vec<String>,
}

/// Arguments for the simulate command
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Buyer node data directory
    #[arg(short, long)]
    pub buyer: Option<PathBuf>,

    /// Version for the buyer node
    #[arg(long, requires = "buyer")]
    pub buyer_version: Option<String>,

    /// Vendor node data directory
    #[arg(long)]
    pub vendor: Option<PathBuf>,

    /// Version for the vendor node
    #[arg(long, requires = "vendor")]
    pub vendor_version: Option<String>,

    /// Moderator node data directory
    #[arg(short, long, visible_alias = "mod")]
    pub moderator: Option<PathBuf>,

    /// Version for the moderator node
    #[arg(long, requires = "moderator")]
    pub moderator_version: Option<String>,

    /// Start command-line nodes on testnet
    #[arg(short, long)]
    pub testnet: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached versions
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
