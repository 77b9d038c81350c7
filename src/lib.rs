//! Samulator - versioned daemon builds and multi-node simulation
//!
//! Builds each daemon version once into a persistent artifact cache,
//! wraps the binary in a stateful process runner, and orchestrates
//! several nodes running side by side.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod ui;

pub use error::{SamulatorError, SamulatorResult};
