use tokio::signal;

/// Resolves once Ctrl+C or SIGTERM arrives; passed to axum's graceful shutdown.
pub(crate) async fn shutdown_signal() {
    let received = tokio::select! {
        _ = ctrl_c() => "ctrl_c",
        _ = terminate() => "sigterm",
    };

    tracing::info!(signal = received, "Shutdown signal received; draining open requests");
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
