use std::{sync::Arc, time::Duration};

use axum::{
    http::{header::CONTENT_TYPE, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod error;
pub mod routes;

use crate::{config::Config, state::AppState};
use error::ServerError;
use routes::{
    cast_vote_handler, health_handler, leaderboard_handler, points_handler, reward_handler,
    rewards_handler, streak_handler, voted_handler, votes_handler,
};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/votes", post(cast_vote_handler))
        .route("/votes/{movie_id}", get(votes_handler))
        .route("/votes/{movie_id}/voters/{address}", get(voted_handler))
        .route("/points", post(points_handler))
        .route("/streaks/{address}", get(streak_handler))
        .route("/rewards", get(rewards_handler))
        .route("/rewards/{streak}", get(reward_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl+C or SIGTERM, then write the state file.
pub async fn start_server(config: Config) -> Result<(), ServerError> {
    info!("Initializing state...");
    let state = AppState::new(config)?;

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    state.persist()?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
