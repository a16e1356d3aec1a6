//! Request tracing for the health API.
//!
//! Dashboards poll the health endpoints every few seconds, so successful polls
//! are logged at debug and only slow or failed ones surface at higher levels.

use http::{Request, Response};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnFailure, OnRequest, OnResponse, TraceLayer,
};
use tracing::{debug, error, info_span, warn, Span};
use uuid::Uuid;

const HEALTH_PATH_PREFIX: &str = "/api/system/health";

/// Polls slower than this are logged at warn even when they succeed.
const SLOW_POLL: Duration = Duration::from_secs(2);

pub type HealthTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    LogRequest,
    LogResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    LogFailure,
>;

fn is_health_poll(path: &str) -> bool {
    path.starts_with(HEALTH_PATH_PREFIX)
}

/// One span per request, tagged with a fresh request id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "health_api",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
            health_poll = is_health_poll(request.uri().path()),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogRequest;

impl<B> OnRequest<B> for LogRequest {
    fn on_request(&mut self, request: &Request<B>, _span: &Span) {
        debug!("{} {}", request.method(), request.uri().path());
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogResponse {
    slow_after: Duration,
}

impl Default for LogResponse {
    fn default() -> Self {
        Self { slow_after: SLOW_POLL }
    }
}

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status().as_u16();
        let latency_ms = latency.as_millis();

        if response.status().is_server_error() {
            error!(status, latency_ms, "health api request failed");
        } else if response.status().is_client_error() {
            warn!(status, latency_ms, "health api rejected request");
        } else if latency > self.slow_after {
            warn!(status, latency_ms, "slow health api response");
        } else {
            debug!(status, latency_ms, "health api response");
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogFailure;

impl OnFailure<ServerErrorsFailureClass> for LogFailure {
    fn on_failure(&mut self, failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        error!(latency_ms = latency.as_millis(), failure = %failure, "health api request errored");
    }
}

pub fn logging_layer() -> HealthTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(LogRequest)
        .on_response(LogResponse::default())
        .on_failure(LogFailure)
}
