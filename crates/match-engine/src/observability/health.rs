//! Health endpoints for the match engine.
//!
//! - `GET /health` - liveness; answers whenever the HTTP server does
//! - `GET /ready` - readiness; the coordinator is running and accepting joins
//!
//! `/metrics` is merged in by the binary from the Prometheus exporter handle.

use crate::actors::MatchCoordinatorHandle;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness inputs shared with the HTTP handlers.
///
/// The binary sets the startup flag once the server is bound and clears it
/// when shutdown begins. Readiness also asks the coordinator directly, so a
/// draining or exited coordinator reports unavailable on its own.
pub struct HealthState {
    started: AtomicBool,
    coordinator: MatchCoordinatorHandle,
}

impl HealthState {
    #[must_use]
    pub fn new(coordinator: MatchCoordinatorHandle) -> Self {
        Self {
            started: AtomicBool::new(false),
            coordinator,
        }
    }

    pub fn set_ready(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.started.store(false, Ordering::SeqCst);
    }

    /// Ready when started and the coordinator answers without draining.
    pub async fn is_ready(&self) -> bool {
        if !self.started.load(Ordering::SeqCst) {
            return false;
        }
        match self.coordinator.get_status().await {
            Ok(status) => !status.is_draining,
            Err(_) => false,
        }
    }
}

/// Router serving `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::actors::ActorMetrics;
    use crate::config::EngineSettings;
    use crate::outcome::TracingOutcomeSink;
    use crate::registry::ConnectionRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn coordinator() -> MatchCoordinatorHandle {
        MatchCoordinatorHandle::new(
            EngineSettings::default(),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(TracingOutcomeSink),
            ActorMetrics::new(),
        )
    }

    async fn status_of(app: Router, path: &str) -> StatusCode {
        let request = Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");
        app.oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[tokio::test]
    async fn test_not_ready_until_started() {
        let state = HealthState::new(coordinator());
        assert!(!state.is_ready().await);
        state.set_ready();
        assert!(state.is_ready().await);
        state.set_not_ready();
        assert!(!state.is_ready().await);
    }

    #[tokio::test]
    async fn test_health_endpoint_ok_while_starting() {
        let app = health_router(Arc::new(HealthState::new(coordinator())));
        assert_eq!(status_of(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint_follows_state() {
        let state = Arc::new(HealthState::new(coordinator()));
        assert_eq!(
            status_of(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        assert_eq!(
            status_of(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::OK
        );

        state.set_not_ready();
        assert_eq!(
            status_of(health_router(state), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_ready_endpoint_unavailable_once_coordinator_stops() {
        let coordinator = coordinator();
        let state = Arc::new(HealthState::new(coordinator.clone()));
        state.set_ready();
        assert_eq!(
            status_of(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::OK
        );

        coordinator.shutdown().await.unwrap();

        // The startup flag is still set; the coordinator alone decides.
        assert_eq!(
            status_of(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(health_router(state), "/health").await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_unknown_path_returns_404() {
        let app = health_router(Arc::new(HealthState::new(coordinator())));
        assert_eq!(status_of(app, "/matches").await, StatusCode::NOT_FOUND);
    }
}
