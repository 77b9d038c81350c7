//! Terminal output for the CLI
//!
//! Spinners and colored step markers when attached to a terminal, plain
//! bracketed markers in CI and when output is piped. All of it is written
//! to stderr.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{step_info, step_ok, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
