//! W3C Trace Context propagation for outbound HTTP calls.
//!
//! Calls to third-party APIs (payment provider, AI proxy) carry the current
//! span's `traceparent`/`tracestate` so provider latency shows up inside the
//! request trace.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::TraceContextExt;
use reqwest::header::HeaderMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Header name for W3C traceparent
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header name for W3C tracestate
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Header name for request correlation ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Inject the current span's trace context into outbound headers.
///
/// Does nothing when there is no valid OpenTelemetry context (e.g. OTLP
/// export disabled).
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
    if !tracestate.is_empty()
        && let Ok(value) = tracestate.parse()
    {
        headers.insert(TRACESTATE_HEADER, value);
    }
}

/// Inject trace context plus an optional request ID.
pub fn inject_trace_headers(headers: &mut HeaderMap, request_id: Option<&str>) {
    inject_trace_context(headers);

    if let Some(id) = request_id
        && let Ok(value) = id.parse()
    {
        headers.insert(REQUEST_ID_HEADER, value);
    }
}

pub fn extract_traceparent(headers: &HeaderMap) -> Option<String> {
    header_string(headers, TRACEPARENT_HEADER)
}

pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    header_string(headers, REQUEST_ID_HEADER)
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// A reqwest request that gets trace headers injected right before sending.
pub struct TracedRequest {
    request: reqwest::RequestBuilder,
}

impl TracedRequest {
    pub fn new(request: reqwest::RequestBuilder) -> Self {
        Self { request }
    }

    pub fn header(self, key: &str, value: &str) -> Self {
        Self {
            request: self.request.header(key, value),
        }
    }

    pub fn query<T: serde::Serialize + ?Sized>(self, query: &T) -> Self {
        Self {
            request: self.request.query(query),
        }
    }

    pub fn json<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        Self {
            request: self.request.json(json),
        }
    }

    pub fn bearer_auth<T: std::fmt::Display>(self, token: T) -> Self {
        Self {
            request: self.request.bearer_auth(token),
        }
    }

    pub fn timeout(self, timeout: std::time::Duration) -> Self {
        Self {
            request: self.request.timeout(timeout),
        }
    }

    pub async fn send(self) -> Result<reqwest::Response, reqwest::Error> {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        self.request.headers(headers).send().await
    }
}

/// Extension trait for creating traced requests from a `reqwest::Client`.
pub trait TracedClientExt {
    fn traced_get(&self, url: &str) -> TracedRequest;
    fn traced_post(&self, url: &str) -> TracedRequest;
}

impl TracedClientExt for reqwest::Client {
    fn traced_get(&self, url: &str) -> TracedRequest {
        TracedRequest::new(self.get(url))
    }

    fn traced_post(&self, url: &str) -> TracedRequest {
        TracedRequest::new(self.post(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_active_span_injects_nothing() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn request_id_is_injected_without_span() {
        let mut headers = HeaderMap::new();
        inject_trace_headers(&mut headers, Some("sync-42"));
        assert_eq!(extract_request_id(&headers), Some("sync-42".to_string()));
        assert!(extract_traceparent(&headers).is_none());
    }

    #[test]
    fn extracts_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            TRACEPARENT_HEADER,
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
                .parse()
                .unwrap(),
        );

        assert_eq!(
            extract_traceparent(&headers),
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01".to_string())
        );
    }
}
