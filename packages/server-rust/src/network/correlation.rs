//! Per-request correlation: id generation, request span and completion log.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::extract::{ConnectInfo, Request};
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use fluxdemo_core::{CorrelationContext, FALLBACK_REQUEST_ID};
use futures_util::StreamExt;
use tracing::{info, info_span, warn, Instrument, Span};

/// Header carrying the correlation id on requests and responses.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Attaches a fresh [`CorrelationContext`] to the request, runs the rest of
/// the stack inside a `request` span, echoes the id in `X-Request-ID`, and
/// logs one completion line when the response body is finished or dropped.
///
/// Any inbound `X-Request-ID` is replaced; ids are always server-generated.
pub async fn correlate(mut req: Request, next: Next) -> Response {
    let generated = CorrelationContext::generate();
    let (ctx, header) = match HeaderValue::from_str(generated.id()) {
        Ok(header) => (generated, header),
        Err(err) => {
            warn!(error = %err, "correlation id is not a valid header value, using fallback");
            (
                CorrelationContext::fallback(),
                HeaderValue::from_static(FALLBACK_REQUEST_ID),
            )
        }
    };

    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    req.headers_mut().insert(REQUEST_ID_HEADER, header.clone());
    req.extensions_mut().insert(ctx.clone());

    let span = info_span!(
        "request",
        request_id = %ctx.id(),
        method = %method,
        path = %path,
    );
    let mut completion = Completion {
        ctx,
        method,
        path,
        remote,
        status: None,
        span: span.clone(),
    };

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, header);
    completion.status = Some(response.status());

    // Sized bodies are complete already; streamed ones are logged when they end.
    if response.body().size_hint().exact().is_some() {
        drop(completion);
        return response;
    }
    let (parts, body) = response.into_parts();
    let stream = body.into_data_stream().map(move |chunk| {
        let _keep = &completion;
        chunk
    });
    Response::from_parts(parts, Body::from_stream(stream))
}

/// Emits the completion line on drop: after the body finishes, or when the
/// client goes away before it does.
struct Completion {
    ctx: CorrelationContext,
    method: Method,
    path: String,
    remote: String,
    status: Option<StatusCode>,
    span: Span,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        let duration_ms = duration_millis(self.ctx.elapsed());
        match self.status {
            Some(status) => info!(
                request_id = %self.ctx.id(),
                method = %self.method,
                path = %self.path,
                remote_addr = %self.remote,
                status = status.as_u16(),
                duration_ms,
                "request completed"
            ),
            None => info!(
                request_id = %self.ctx.id(),
                method = %self.method,
                path = %self.path,
                remote_addr = %self.remote,
                duration_ms,
                "request cancelled"
            ),
        }
    }
}

fn duration_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fmt;
    use std::sync::Arc;

    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::{Extension, Router};
    use parking_lot::Mutex;
    use tower::ServiceExt;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;

    type Fields = BTreeMap<&'static str, String>;

    /// Collects the fields of every event emitted while installed.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<Fields>>>);

    impl Captured {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
        }

        fn completions(&self) -> Vec<Fields> {
            self.0
                .lock()
                .iter()
                .filter(|fields| {
                    matches!(
                        fields.get("message").map(String::as_str),
                        Some("request completed" | "request cancelled")
                    )
                })
                .cloned()
                .collect()
        }
    }

    struct FieldVisitor<'a>(&'a mut Fields);

    impl Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name(), format!("{value:?}"));
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Fields::new();
            event.record(&mut FieldVisitor(&mut fields));
            self.0.lock().push(fields);
        }
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/id",
                get(|Extension(ctx): Extension<CorrelationContext>| async move {
                    ctx.id().to_owned()
                }),
            )
            .layer(from_fn(correlate))
    }

    fn get_req(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn response_header_matches_context_seen_by_handler() {
        let response = app().oneshot(get_req("/id")).await.unwrap();
        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_owned();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(header.as_bytes(), &body[..]);
        assert!(uuid::Uuid::parse_str(&header).is_ok());
    }

    #[tokio::test]
    async fn inbound_id_is_replaced() {
        let req = Request::builder()
            .uri("/id")
            .header("x-request-id", "client-chosen")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_ne!(response.headers()[REQUEST_ID_HEADER], "client-chosen");
    }

    #[tokio::test]
    async fn unmatched_routes_still_carry_the_header() {
        let response = app().oneshot(get_req("/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn ids_differ_between_requests() {
        let a = app().oneshot(get_req("/id")).await.unwrap();
        let b = app().oneshot(get_req("/id")).await.unwrap();
        assert_ne!(a.headers()[REQUEST_ID_HEADER], b.headers()[REQUEST_ID_HEADER]);
    }

    #[tokio::test]
    async fn sized_response_logs_one_completion() {
        let captured = Captured::default();
        let _guard = captured.install();

        let response = app().oneshot(get_req("/id")).await.unwrap();
        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_owned();
        drop(response);

        let lines = captured.completions();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["message"], "request completed");
        assert_eq!(line["request_id"], header);
        assert_eq!(line["method"], "GET");
        assert_eq!(line["path"], "/id");
        assert_eq!(line["remote_addr"], "unknown");
        assert_eq!(line["status"], "200");
        assert!(line.contains_key("duration_ms"));
    }

    #[tokio::test]
    async fn streamed_response_logs_after_last_chunk() {
        let captured = Captured::default();
        let _guard = captured.install();

        let app = Router::new()
            .route(
                "/stream",
                get(|| async {
                    let chunks = futures_util::stream::iter(["a", "b", "c"])
                        .map(Ok::<_, std::io::Error>);
                    Body::from_stream(chunks)
                }),
            )
            .layer(from_fn(correlate));

        let response = app.oneshot(get_req("/stream")).await.unwrap();
        assert!(captured.completions().is_empty());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"abc");

        let lines = captured.completions();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "request completed");
        assert_eq!(lines[0]["path"], "/stream");
    }

    #[tokio::test]
    async fn dropped_handler_logs_cancellation() {
        let captured = Captured::default();
        let _guard = captured.install();

        let app = Router::new()
            .route(
                "/hang",
                get(|| async {
                    std::future::pending::<()>().await;
                    "unreachable"
                }),
            )
            .layer(from_fn(correlate));

        let outcome =
            tokio::time::timeout(Duration::from_millis(20), app.oneshot(get_req("/hang"))).await;
        assert!(outcome.is_err());

        let lines = captured.completions();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "request cancelled");
        assert_eq!(lines[0]["path"], "/hang");
        assert!(!lines[0].contains_key("status"));
    }
}
