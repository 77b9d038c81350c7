//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, LogFormat};

use tracing::warn;

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!("Failed to listen for SIGINT: {}", e);
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for SIGINT: {}", e);
                }
            }
        }
    }

    #[cfg(not(unix))]
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
    }
}
