//! HTTP API server with observability for the orders service.
//!
//! Provides the order endpoints, health and metrics, the per-request
//! deadline, and the supervisor that runs the server next to the
//! background worker.

pub mod config;
pub mod deadline;
pub mod error;
pub mod routes;
pub mod server;
pub mod supervisor;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Router, middleware};
use domain::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use pipeline::{EventSender, OrderCreatedEvent};
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// `/healthz` and `/metrics` are merged in after the trace layer, so they
/// produce no request spans. Unknown paths and methods answer with the
/// standard error body.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    request_timeout: Duration,
) -> Router {
    let probes = Router::new()
        .route("/healthz", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .method_not_allowed_fallback(error::method_not_allowed)
        .fallback(error::route_not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(
            request_timeout,
            deadline::stamp_deadline,
        ))
        .layer(TraceLayer::new_for_http())
        .merge(probes)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Creates the application state around a store and the producer half of
/// the event channel.
pub fn create_state<S: OrderStore + 'static>(
    store: S,
    events: EventSender<OrderCreatedEvent>,
    shutdown: CancellationToken,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        order_service: OrderService::new(store, events, shutdown),
    })
}
