//! Network module with deferred startup lifecycle.
//!
//! `new()` creates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::auth::{require_access, AuthState};
use super::config::{NetworkConfig, TlsConfig};
use super::correlation::correlate;
use super::error::{boundary_errors, handler_errors};
use super::handlers::{
    admin_endpoint, create_user, current_user, delete_user, export_batched, export_blocking,
    export_staged, get_user, health_handler, list_users, liveness_handler, method_not_allowed,
    protected_endpoint, public_endpoint, readiness_handler, route_not_found, test_bad_request,
    test_error, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::ServerConfig;

/// Assembles the full application: routes, intercepts and middleware.
///
/// Request path (outermost first):
/// 1. correlation id, request span and completion log
/// 2. boundary error intercept (unmatched routes, panics, leftovers)
/// 3. trace, CORS, whole-request timeout
/// 4. in-flight tracking for graceful drain
/// 5. authentication and access policy
/// 6. handler error intercept (matched routes only)
pub fn build_app(state: AppState, network: &NetworkConfig) -> Router {
    let auth = Arc::new(AuthState::new(state.config.security_enabled));

    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/test-error", get(test_error))
        .route("/api/users/test-bad-request", get(test_bad_request))
        .route("/api/users/{id}", get(get_user).delete(delete_user))
        .route("/api/users/export/{id}", get(export_blocking))
        .route("/api/users/export-reactive/{id}", get(export_staged))
        .route("/api/users/export-batch/{id}", get(export_batched))
        .route("/api/auth/public", get(public_endpoint))
        .route("/api/auth/protected", get(protected_endpoint))
        .route("/api/auth/admin", get(admin_endpoint))
        .route("/api/auth/me", get(current_user))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .method_not_allowed_fallback(method_not_allowed)
        .route_layer(from_fn(handler_errors))
        .fallback(route_not_found)
        .layer(from_fn_with_state(auth, require_access))
        .layer(from_fn_with_state(
            Arc::clone(&state.shutdown),
            track_in_flight,
        ))
        .layer(build_http_layers(network))
        .layer(from_fn(boundary_errors))
        .layer(from_fn(correlate))
        .with_state(state)
}

async fn track_in_flight(
    State(shutdown): State<Arc<ShutdownController>>,
    req: Request,
    next: Next,
) -> Response {
    let _guard = shutdown.in_flight_guard();
    next.run(req).await
}

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates shared state (export pipeline, shutdown controller)
/// 2. `start()` -- binds TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled, then drains
pub struct NetworkModule {
    config: NetworkConfig,
    state: AppState,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, server: ServerConfig) -> Self {
        Self::with_state(config, AppState::new(server))
    }

    #[must_use]
    pub fn with_state(config: NetworkConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            listener: None,
        }
    }

    /// Shared shutdown controller, for health checks or external triggers.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    #[must_use]
    pub fn build_router(&self) -> Router {
        build_app(self.state.clone(), &self.config)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// When the signal fires the health state moves to Draining, the
    /// listener stops accepting, and in-flight requests get up to
    /// `drain_timeout` to finish before the state moves to Stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first, if TLS material
    /// cannot be loaded, or if the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let router = build_app(self.state.clone(), &self.config);
        let controller = Arc::clone(&self.state.shutdown);

        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                shutdown.await;
                info!("Shutdown signal received, draining");
                controller.trigger_shutdown();
            }
        };

        controller.set_ready();

        if let Some(tls) = &self.config.tls {
            serve_tls(listener, router, tls, signal).await?;
        } else {
            serve_plain(listener, router, signal).await?;
        }

        drain(&controller, &self.config).await;
        self.state.exports.pool().close();
        Ok(())
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Serving plain HTTP connections");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await?;
    Ok(())
}

/// Serves TLS connections using `axum-server` with rustls, reusing the
/// pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        signal.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}

async fn drain(controller: &ShutdownController, config: &NetworkConfig) {
    controller.trigger_shutdown();
    if controller.wait_for_drain(config.drain_timeout).await {
        info!("All in-flight requests drained");
    } else {
        warn!(
            remaining = controller.in_flight_count(),
            "Drain timeout expired with in-flight requests remaining"
        );
    }
}
