//! Log subscriber and OpenTelemetry bridge.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::{Config, LogFormat};

pub const SERVICE_NAME: &str = "orders-service";

/// Installs the global subscriber: env filter, OpenTelemetry layer and a
/// text or JSON formatter.
///
/// The returned provider backs every span's trace context and must be kept
/// alive for the lifetime of the process. No exporter is attached.
pub fn init(config: &Config) -> Result<TracerProvider, TryInitError> {
    let provider = TracerProvider::builder().build();
    let otel = tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (json, text) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel)
        .with(json)
        .with(text)
        .try_init()?;

    if let Some(endpoint) = &config.tracing_exporter_endpoint {
        tracing::warn!(%endpoint, "span export is not supported, spans stay in-process");
    }

    Ok(provider)
}
