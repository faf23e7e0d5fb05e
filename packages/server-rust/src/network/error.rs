//! Failure classification and the two error intercepts.
//!
//! Handlers return [`ApiError`]. Its `IntoResponse` does not render anything
//! itself: it attaches the error to an empty response as a [`Failure`]
//! marker. The handler-level intercept ([`handler_errors`], installed with
//! `route_layer` on the API routes) renders markers from matched routes; the
//! boundary-level intercept ([`boundary_errors`], outermost after correlation)
//! renders whatever is left, plus panics. A marker is rendered exactly once.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use fluxdemo_core::error_record::DEFAULT_ERROR_MESSAGE;
use fluxdemo_core::{CorrelationContext, ErrorRecord};
use serde_json::Value;
use futures_util::FutureExt;
use tracing::error;

use crate::service::{cause_chain, ExportError};

/// Discriminant matched once when a failure is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Caller supplied bad input. 400 at the handler level.
    ValidationFailure,
    UnhandledFailure,
    /// No route or method matched.
    RouteNotFound,
    /// An export task failed, timed out, was cancelled or rejected.
    PipelineTransientFailure,
}

/// HTTP-facing failure with a kind, a client-visible message and an
/// optional cause that is only ever logged.
#[derive(Debug, Clone)]
pub struct ApiError {
    kind: FailureKind,
    exception: &'static str,
    message: String,
    status: Option<StatusCode>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ApiError {
    fn new(kind: FailureKind, exception: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            exception,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Explicitly rejected input (`IllegalArgumentException`).
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            FailureKind::ValidationFailure,
            "IllegalArgumentException",
            message,
        )
    }

    /// Unclassified failure (`RuntimeException`).
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FailureKind::UnhandledFailure, "RuntimeException", message)
    }

    /// Path or body input that could not be decoded (`ServerWebInputException`).
    #[must_use]
    pub fn input<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(
            FailureKind::ValidationFailure,
            "ServerWebInputException",
            message,
        )
        .with_source(source)
    }

    #[must_use]
    pub fn route_not_found(method: &Method, path: &str) -> Self {
        Self::new(
            FailureKind::RouteNotFound,
            "ResponseStatusException",
            format!("No route matches {method} {path}"),
        )
    }

    #[must_use]
    pub fn method_not_allowed(method: &Method) -> Self {
        Self::new(
            FailureKind::RouteNotFound,
            "ResponseStatusException",
            format!("Request method '{method}' is not supported"),
        )
        .with_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// The whole-request deadline elapsed before a response was produced.
    #[must_use]
    pub fn request_timeout() -> Self {
        Self::new(
            FailureKind::UnhandledFailure,
            "ResponseStatusException",
            "Request did not complete within the configured timeout",
        )
        .with_status(StatusCode::REQUEST_TIMEOUT)
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    #[must_use]
    pub fn exception(&self) -> &'static str {
        self.exception
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Status chosen by the handler-level intercept.
    #[must_use]
    pub fn handler_status(&self) -> StatusCode {
        self.status.unwrap_or(match self.kind {
            FailureKind::ValidationFailure => StatusCode::BAD_REQUEST,
            FailureKind::UnhandledFailure
            | FailureKind::RouteNotFound
            | FailureKind::PipelineTransientFailure => StatusCode::INTERNAL_SERVER_ERROR,
        })
    }

    /// Status chosen by the boundary-level intercept.
    #[must_use]
    pub fn boundary_status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Full diagnostic text: message followed by the cause chain.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        match &self.source {
            Some(source) => format!("{}; caused by: {}", self.message, cause_chain(&**source)),
            None => self.message.clone(),
        }
    }

    fn record(&self, status: StatusCode, facts: &RequestFacts) -> ErrorRecord {
        ErrorRecord::new(
            facts.path.as_str(),
            facts.method.as_str(),
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            self.message.clone(),
            self.exception,
            facts.request_id.clone(),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exception, self.message)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        let status =
            matches!(err, ExportError::Overloaded).then_some(StatusCode::SERVICE_UNAVAILABLE);
        let mut api = Self::new(
            FailureKind::PipelineTransientFailure,
            err.exception_name(),
            err.to_string(),
        );
        api.status = status;
        api.with_source(err)
    }
}

/// Response extension carrying an unrendered failure.
#[derive(Debug, Clone)]
pub struct Failure(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.handler_status().into_response();
        response.extensions_mut().insert(Failure(Arc::new(self)));
        response
    }
}

// ---------------------------------------------------------------------------
// Intercepts
// ---------------------------------------------------------------------------

struct RequestFacts {
    method: Method,
    path: String,
    request_id: Option<String>,
}

impl RequestFacts {
    fn of(req: &Request) -> Self {
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_owned(),
            request_id: req
                .extensions()
                .get::<CorrelationContext>()
                .map(|ctx| ctx.id().to_owned()),
        }
    }

    fn log(&self, intercept: &'static str, status: StatusCode, failure: &ApiError) {
        error!(
            intercept,
            request_id = self.request_id.as_deref().unwrap_or("-"),
            method = %self.method,
            path = %self.path,
            status = status.as_u16(),
            exception = failure.exception(),
            kind = ?failure.kind(),
            detail = %failure.diagnostic(),
            "request failed"
        );
    }
}

/// Handler-level intercept: renders failures raised by matched handlers.
pub async fn handler_errors(req: Request, next: Next) -> Response {
    let facts = RequestFacts::of(&req);
    let mut response = next.run(req).await;
    let Some(Failure(failure)) = response.extensions_mut().remove::<Failure>() else {
        return response;
    };

    let status = failure.handler_status();
    facts.log("handler", status, &failure);
    let record = failure.record(status, &facts);
    (status, Json(record)).into_response()
}

/// Boundary-level intercept: renders anything the handler level missed,
/// including panics, without content negotiation.
pub async fn boundary_errors(req: Request, next: Next) -> Response {
    let facts = RequestFacts::of(&req);
    let failure = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(mut response) => match response.extensions_mut().remove::<Failure>() {
            Some(Failure(failure)) => failure,
            None if is_bare_timeout(&response) => Arc::new(ApiError::request_timeout()),
            None => return response,
        },
        Err(panic) => Arc::new(
            ApiError::new(
                FailureKind::UnhandledFailure,
                "PanicException",
                panic_message(panic.as_ref()),
            ),
        ),
    };

    let status = failure.boundary_status();
    facts.log("boundary", status, &failure);
    let record = failure.record(status, &facts);
    write_json(status, &record, &facts)
}

/// A 408 with no body comes from the whole-request timeout layer.
fn is_bare_timeout(response: &Response) -> bool {
    response.status() == StatusCode::REQUEST_TIMEOUT
        && response.body().size_hint().exact() == Some(0)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

/// Last-resort body assembled without the serializer.
fn fallback_body(facts: &RequestFacts) -> Vec<u8> {
    let timestamp = Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.f");
    let request_id = facts
        .request_id
        .as_deref()
        .map(|id| format!(r#","requestId":{}"#, Value::from(id)))
        .unwrap_or_default();
    format!(
        concat!(
            r#"{{"timestamp":"{timestamp}","path":{path},"method":{method},"status":500,"#,
            r#""error":"Internal Server Error","message":"{message}","#,
            r#""exception":"RuntimeException"{request_id}}}"#,
        ),
        timestamp = timestamp,
        path = Value::from(facts.path.as_str()),
        method = Value::from(facts.method.as_str()),
        message = DEFAULT_ERROR_MESSAGE,
        request_id = request_id,
    )
    .into_bytes()
}

fn write_json(status: StatusCode, record: &ErrorRecord, facts: &RequestFacts) -> Response {
    let (status, bytes) = match serde_json::to_vec(record) {
        Ok(bytes) => (status, bytes),
        Err(err) => {
            error!(error = %err, "failed to serialize error record");
            (StatusCode::INTERNAL_SERVER_ERROR, fallback_body(facts))
        }
    };
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
