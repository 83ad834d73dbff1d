//! Shutdown signal handling for the provisioning server.

use tracing::{error, info};

/// Resolve once SIGINT (Ctrl+C) or, on Unix, SIGTERM arrives.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored, leaving the other one in place.
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C)"),
        _ = terminate => info!("received SIGTERM"),
    }
}
