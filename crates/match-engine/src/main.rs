//! Match Engine
//!
//! Authoritative tic-tac-toe match engine.
//!
//! # Servers
//!
//! The binary runs one HTTP server (default: 0.0.0.0:8081) for liveness,
//! readiness and Prometheus `/metrics`. Player transports embed the library
//! and drive `MatchCoordinatorHandle` directly.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Build the connection registry and outcome sink
//! 4. Spawn the coordinator actor
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Mark ready and wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use match_engine::actors::{ActorMetrics, MatchCoordinatorHandle};
use match_engine::config::Config;
use match_engine::observability::{health_router, init_metrics_recorder, HealthState};
use match_engine::outcome::{OutcomeSink, TracingOutcomeSink};
use match_engine::registry::ConnectionRegistry;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "match_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Match Engine");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        engine_id = %config.engine_id,
        health_bind_address = %config.health_bind_address,
        disconnect_grace_period_seconds = config.disconnect_grace_period_seconds,
        match_eviction_grace_seconds = config.match_eviction_grace_seconds,
        shutdown_timeout_seconds = config.shutdown_timeout_seconds,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    // Initialize actor system
    let registry = Arc::new(ConnectionRegistry::new());
    let sink: Arc<dyn OutcomeSink> = Arc::new(TracingOutcomeSink);
    let actor_metrics = ActorMetrics::new();
    let coordinator = MatchCoordinatorHandle::new(
        config.engine_settings(),
        Arc::clone(&registry),
        sink,
        Arc::clone(&actor_metrics),
    );
    info!("Actor system initialized");

    let health_state = Arc::new(HealthState::new(coordinator.clone()));

    let shutdown_token = CancellationToken::new();

    // Start health HTTP server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let health_router = health_router(Arc::clone(&health_state));

    // Add /metrics endpoint served by Prometheus exporter
    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let app = health_router
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http());

    // Bind listener BEFORE spawning to fail fast on bind errors
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;
    info!(addr = %health_addr, "Health server bound successfully");

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    health_state.set_ready();
    info!("Match Engine running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop routing players here
    health_state.set_not_ready();

    if let Err(e) = coordinator.shutdown().await {
        warn!(error = %e, "Actor system shutdown error");
    }
    info!(
        messages_processed = actor_metrics
            .total_messages_processed
            .load(std::sync::atomic::Ordering::Relaxed),
        actor_panics = actor_metrics.panic_count(),
        "Actor system stopped"
    );

    shutdown_token.cancel();
    if let Err(e) = health_task.await {
        warn!(error = %e, "Health server task failed to join");
    }

    info!("Match Engine shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
