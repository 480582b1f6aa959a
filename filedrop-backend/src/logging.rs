//! Logging things
//!

use std::time::Duration;

use axum::{http::header::CONTENT_LENGTH, response::Response};
use tower_http::{
    classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier},
    trace::{OnFailure, OnRequest, OnResponse, TraceLayer},
};
use tracing::{trace, Span};

/// Builds one span per request and fills it in as the response goes out.
#[derive(Copy, Clone)]
pub(crate) struct FiledropSpanner {}

impl<B> tower_http::trace::MakeSpan<B> for FiledropSpanner {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            status = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            bytes = tracing::field::Empty
        )
    }
}

impl<B> OnRequest<B> for FiledropSpanner {
    fn on_request(&mut self, _request: &axum::http::Request<B>, _span: &Span) {
        trace!("request received");
    }
}

impl<B> OnResponse<B> for FiledropSpanner {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        span.record("status", response.status().as_u16());
        span.record("latency_ms", latency.as_millis() as u64);
        if let Some(content_length) = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            span.record("bytes", content_length);
        }
        tracing::event!(tracing::Level::INFO, "response sent");
    }
}

impl OnFailure<ServerErrorsFailureClass> for FiledropSpanner {
    fn on_failure(&mut self, failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
        tracing::error!(
            latency_ms = latency.as_millis() as u64,
            "request failed: {}",
            failure
        );
    }
}

pub(crate) fn logging_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    FiledropSpanner,
    FiledropSpanner,
    FiledropSpanner,
    tower_http::trace::DefaultOnBodyChunk,
    tower_http::trace::DefaultOnEos,
    FiledropSpanner,
> {
    TraceLayer::new_for_http()
        .on_request(FiledropSpanner {})
        .make_span_with(FiledropSpanner {})
        .on_response(FiledropSpanner {})
        .on_failure(FiledropSpanner {})
}
