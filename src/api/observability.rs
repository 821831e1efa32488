//! Request tracing and HTTP metrics for the student API.

use axum::{
    extract::{MatchedPath, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, Span, field, info, info_span, warn};
use uuid::Uuid;

use super::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const STUDENT_ROUTE: &str = "/students/{id}";

/// Coarse result class of a request, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Rejected,
    Failed,
}

impl Outcome {
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Self::Failed
        } else if status.is_client_error() {
            Self::Rejected
        } else {
            Self::Success
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// `GET /metrics`
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.prometheus_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics are disabled").into_response(),
    }
}

/// The `{id}` segment of a `/students/{id}` request, when it is a valid id.
fn student_id(route: Option<&str>, path: &str) -> Option<i32> {
    if route != Some(STUDENT_ROUTE) {
        return None;
    }
    path.rsplit('/').next()?.parse().ok()
}

/// Wraps every routed request in a `request` span and records its metrics.
///
/// The span carries a fresh request id and, on single-student routes, the
/// student id, so service events logged during the request inherit both.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned());

    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %method,
        route = route.as_deref().unwrap_or("unmatched"),
        student_id = field::Empty,
    );
    if let Some(id) = student_id(route.as_deref(), req.uri().path()) {
        span.record("student_id", id);
    }

    let response = next.run(req).instrument(span.clone()).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let outcome = Outcome::from_status(status);

    let labels = [
        ("method", method.to_string()),
        ("path", route.unwrap_or_else(|| "unmatched".to_owned())),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_request_duration_seconds", &labels).record(elapsed.as_secs_f64());

    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    span.in_scope(|| {
        if outcome == Outcome::Failed {
            warn!(
                event = "http_request_finished",
                status = status.as_u16(),
                duration_ms,
                outcome = outcome.as_str(),
                "Request failed"
            );
        } else {
            info!(
                event = "http_request_finished",
                status = status.as_u16(),
                duration_ms,
                outcome = outcome.as_str(),
                "Request finished"
            );
        }
    });

    response
}

/// Records the id of a student created during the current request.
///
/// `POST /students` has no id in its path, so the service fills it in once
/// the row exists.
pub fn record_created_student(id: i32) {
    Span::current().record("student_id", id);
}
