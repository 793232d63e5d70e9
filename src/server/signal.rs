// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use crate::logger;

/// Resolve once the process is asked to stop (Unix only)
///
/// | Signal  | Action           |
/// |---------|------------------|
/// | SIGTERM | Graceful stop    |
/// | SIGINT  | Graceful stop    |
///
/// If a handler cannot be registered the error is logged and the future
/// falls back to whichever handler did register (or never resolves).
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = signal(SignalKind::terminate());
    let sigint = signal(SignalKind::interrupt());

    match (sigterm, sigint) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => logger::log_info("SIGTERM received, shutting down"),
                _ = sigint.recv() => logger::log_info("SIGINT received (Ctrl+C), shutting down"),
            }
        }
        (Ok(mut only), Err(e)) | (Err(e), Ok(mut only)) => {
            logger::log_warning(&format!("Failed to register signal handler: {e}"));
            only.recv().await;
            logger::log_info("Shutdown signal received");
        }
        (Err(term), Err(int)) => {
            logger::log_error(&format!(
                "Failed to register signal handlers: {term}; {int}. Relay will run until killed"
            ));
            std::future::pending::<()>().await;
        }
    }
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => logger::log_info("Ctrl+C received, shutting down"),
        Err(e) => {
            logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending::<()>().await;
        }
    }
}
