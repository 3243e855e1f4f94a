//! Health endpoint server.
//!
//! # Responsibilities
//! - Create the Axum router serving the status report
//! - Wire up middleware (tracing, request timeout)
//! - Serve until the shutdown future resolves
//!
//! # Design Decisions
//! - Handlers read manager state only; they never block on it
//! - Status code mirrors health so load balancers need not parse the body

use std::future::Future;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::connection::connector::Connector;
use crate::connection::manager::ConnectionManager;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP server exposing one manager's health.
pub struct HealthServer {
    router: Router,
}

impl HealthServer {
    pub fn new<C: Connector>(manager: ConnectionManager<C>) -> Self {
        Self {
            router: health_router(manager),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Health server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Build the router with all middleware layers.
#[allow(deprecated)]
pub fn health_router<C: Connector>(manager: ConnectionManager<C>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<C>))
        .route("/health/live", get(live_handler))
        .with_state(manager)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

async fn health_handler<C: Connector>(State(manager): State<ConnectionManager<C>>) -> Response {
    let report = manager.health_report();
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        target_name = %manager.name(),
        state = %report.state,
        healthy = report.healthy,
        "Serving health report"
    );
    (status, Json(report)).into_response()
}

async fn live_handler() -> StatusCode {
    StatusCode::OK
}
