//! HTTP listener with bounded graceful shutdown.

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::supervisor::SupervisorError;

/// Serves `app` until `shutdown` is cancelled, then drains in-flight
/// requests for at most `grace`.
///
/// New connections stop being accepted as soon as the token fires. If the
/// drain is not finished when `grace` elapses the server future is dropped
/// and [`SupervisorError::ShutdownTimeout`] is returned.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> Result<(), SupervisorError> {
    let addr = listener.local_addr().map_err(SupervisorError::Serve)?;
    tracing::info!(%addr, "http server listening");

    let signal = shutdown.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            // Only reachable before shutdown if the accept loop itself failed.
            return result.map_err(SupervisorError::Serve);
        }
        () = shutdown.cancelled() => {}
    }

    tracing::info!(?grace, "http server draining in-flight requests");
    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            result.map_err(SupervisorError::Serve)?;
            tracing::info!("http server shut down gracefully");
            Ok(())
        }
        Err(_) => {
            tracing::error!(?grace, "graceful shutdown timed out, closing remaining connections");
            Err(SupervisorError::ShutdownTimeout(grace))
        }
    }
}
