//! Health HTTP server
//!
//! `GET /healthz` liveness, `GET /status` readiness, `GET /metrics` Prometheus text.

use std::io;
use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use contracts::HttpServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

/// Readiness flag published by the pipeline
pub type Readiness = watch::Receiver<bool>;

#[derive(Clone)]
struct ServerState {
    metrics: PrometheusHandle,
    ready: Readiness,
}

/// Bound, not yet serving, health server
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
    local_addr: SocketAddr,
}

impl HealthServer {
    /// Bind the listen address
    ///
    /// # Errors
    /// Fails when the address is invalid or already in use.
    #[instrument(name = "health_server_bind", skip(config, metrics, ready), fields(address = %config.address))]
    pub async fn bind(
        config: &HttpServerConfig,
        metrics: PrometheusHandle,
        ready: Readiness,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.address).await?;
        let local_addr = listener.local_addr()?;

        let router = Router::new()
            .route("/healthz", get(healthz))
            .route("/status", get(status))
            .route("/metrics", get(render_metrics))
            .with_state(ServerState { metrics, ready })
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(TraceLayer::new_for_http());

        Ok(Self {
            listener,
            router,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `cancel` fires, then drain in-flight requests
    pub async fn serve(self, cancel: CancellationToken) -> io::Result<()> {
        info!(address = %self.local_addr, "Health server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        info!("Health server stopped");
        Ok(())
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn status(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    if *state.ready.borrow() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

async fn render_metrics(State(state): State<ServerState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
