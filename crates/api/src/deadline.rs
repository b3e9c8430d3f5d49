//! Per-request deadline.
//!
//! [`stamp_deadline`] records `now + timeout` in the request extensions.
//! Handlers read it back through the [`RequestDeadline`] extractor and hand
//! it to the order service, which bounds its store calls by it and lets the
//! event publish use whatever budget is left. The response itself is never
//! cut off: once the store has answered, the outcome reaches the client.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tokio::time::Instant;

/// Budget used when a request reaches a handler without the middleware.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Point in time by which the request must be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDeadline(pub Instant);

impl RequestDeadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Instant {
        self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestDeadline {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestDeadline>()
            .copied()
            .unwrap_or_else(|| RequestDeadline::after(FALLBACK_TIMEOUT)))
    }
}

/// Middleware that stamps the request deadline.
pub async fn stamp_deadline(
    State(timeout): State<Duration>,
    mut request: Request,
    next: Next,
) -> Response {
    request
        .extensions_mut()
        .insert(RequestDeadline::after(timeout));
    next.run(request).await
}
