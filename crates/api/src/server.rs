//! Serving loop with bounded graceful shutdown.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Serve `router` until `shutdown` resolves, then give in-flight requests up
/// to `grace` to finish before returning anyway.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F, grace: Duration) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.await;
        let _ = signalled_tx.send(());
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        res = &mut server => return Ok(res??),
        _ = signalled_rx => {}
    }

    info!(grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX), "draining in-flight requests");

    match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => {
            res??;
            info!("server stopped");
            Ok(())
        }
        Err(_) => {
            warn!("grace period elapsed; abandoning in-flight requests");
            server.abort();
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
