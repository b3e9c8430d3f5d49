//! Trace context that crosses the in-process channel.
//!
//! The carrier holds the W3C `traceparent` (and `tracestate` when present)
//! of the span that published an event. The worker turns it back into a
//! span context and links its own, independent, span to it.

use std::collections::HashMap;

use opentelemetry::Context as OtelContext;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACE_PARENT: &str = "traceparent";
pub const TRACE_STATE: &str = "tracestate";

/// Serialized point-in-time trace context.
///
/// Plain data: cloning it copies the strings, nothing else is shared. An
/// empty carrier means the publisher had no active trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceCarrier(HashMap<String, String>);

impl TraceCarrier {
    /// Captures the trace context of an OpenTelemetry context.
    pub fn from_context(cx: &OtelContext) -> Self {
        let mut fields = HashMap::new();
        TraceContextPropagator::new().inject_context(cx, &mut fields);
        // The propagator writes an empty tracestate when there is none.
        fields.retain(|_, value| !value.is_empty());
        Self(fields)
    }

    /// Captures the trace context of a `tracing` span.
    ///
    /// Returns an empty carrier when no OpenTelemetry layer is installed.
    pub fn from_span(span: &Span) -> Self {
        Self::from_context(&span.context())
    }

    /// Rebuilds an OpenTelemetry context from the carried fields.
    pub fn to_context(&self) -> OtelContext {
        TraceContextPropagator::new().extract(&self.0)
    }

    /// The carried span context, if it is valid.
    pub fn span_context(&self) -> Option<SpanContext> {
        let cx = self.to_context();
        let span_context = cx.span().span_context().clone();
        span_context.is_valid().then_some(span_context)
    }

    /// Links `span` to the carried context without making it a child.
    ///
    /// Returns false when there was nothing to link.
    pub fn link_to(&self, span: &Span) -> bool {
        match self.span_context() {
            Some(span_context) => {
                span.add_link(span_context);
                true
            }
            None => false,
        }
    }

    pub fn trace_parent(&self) -> Option<&str> {
        self.0.get(TRACE_PARENT).map(String::as_str)
    }

    pub fn trace_state(&self) -> Option<&str> {
        self.0.get(TRACE_STATE).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::layer::SubscriberExt;

    const PARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn carrier_with(fields: &[(&str, &str)]) -> TraceCarrier {
        TraceCarrier(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn empty_context_serializes_to_empty_carrier() {
        let carrier = TraceCarrier::from_context(&OtelContext::new());
        assert!(carrier.is_empty());
        assert_eq!(carrier.trace_parent(), None);
    }

    #[test]
    fn traceparent_survives_a_round_trip() {
        let cx = carrier_with(&[(TRACE_PARENT, PARENT)]).to_context();
        let carrier = TraceCarrier::from_context(&cx);

        assert_eq!(carrier.trace_parent(), Some(PARENT));
        assert_eq!(carrier.trace_state(), None);
    }

    #[test]
    fn tracestate_is_carried_when_present() {
        let cx = carrier_with(&[(TRACE_PARENT, PARENT), (TRACE_STATE, "congo=t61rcWkgMzE")])
            .to_context();
        let carrier = TraceCarrier::from_context(&cx);

        assert_eq!(carrier.trace_state(), Some("congo=t61rcWkgMzE"));
    }

    #[test]
    fn empty_carrier_has_no_span_context() {
        let carrier = TraceCarrier::default();
        assert!(carrier.span_context().is_none());
    }

    #[test]
    fn malformed_traceparent_has_no_span_context() {
        let carrier = carrier_with(&[(TRACE_PARENT, "not-a-traceparent")]);
        assert!(carrier.span_context().is_none());
    }

    #[test]
    fn carrier_serializes_as_flat_map() {
        let carrier = carrier_with(&[(TRACE_PARENT, PARENT)]);
        let json = serde_json::to_value(&carrier).unwrap();
        assert_eq!(json, serde_json::json!({ "traceparent": PARENT }));
    }

    #[test]
    fn span_with_otel_layer_produces_traceparent() {
        let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("publish");
            let carrier = TraceCarrier::from_span(&span);

            assert!(carrier.trace_parent().is_some());
            assert!(carrier.span_context().is_some());

            let consumer = tracing::info_span!("consume");
            assert!(carrier.link_to(&consumer));
        });
    }

    #[test]
    fn span_without_otel_layer_produces_empty_carrier() {
        let span = tracing::info_span!("publish");
        assert!(TraceCarrier::from_span(&span).is_empty());
    }
}
