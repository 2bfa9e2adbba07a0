use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first SIGINT or SIGTERM.
pub async fn wait_for_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        sig_info!(sys, signal = "SIGINT", "received signal, shutting down");
                    }
                    _ = sigterm.recv() => {
                        sig_info!(sys, signal = "SIGTERM", "received signal, shutting down");
                    }
                }
            }
            Err(e) => {
                sig_warn!(sys, error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c().await;

    cancel.cancel();
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => sig_info!(sys, signal = "SIGINT", "received signal, shutting down"),
        Err(e) => sig_error!(sys, error = %e, "cannot listen for SIGINT, shutting down"),
    }
}
