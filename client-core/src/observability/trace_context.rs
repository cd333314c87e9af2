//! Correlation headers for outgoing API calls.
//!
//! Every request leaving the client carries an `x-request-id` and, when the
//! current span belongs to an OpenTelemetry trace, a W3C `traceparent`.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::HeaderMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fresh correlation ID for a single outgoing request.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Inject the current span's trace context as traceparent/tracestate.
///
/// Leaves the headers untouched when no valid span context is active.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let span = Span::current();
    let context = span.context();
    let otel_span = context.span();
    let span_context = otel_span.span_context();

    if !span_context.is_valid() {
        return;
    }

    // version-trace_id-span_id-trace_flags
    let traceparent = format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    );

    if let Ok(value) = traceparent.parse() {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty() {
        if let Ok(value) = tracestate.parse() {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }
}

/// Inject trace context plus the given request ID.
pub fn inject_trace_headers(headers: &mut HeaderMap, request_id: &str) {
    inject_trace_context(headers);

    if let Ok(value) = request_id.parse() {
        headers.insert(REQUEST_ID_HEADER, value);
    }
}

/// Read the request ID back out of a header map.
pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
