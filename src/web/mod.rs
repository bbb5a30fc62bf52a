pub mod chart;
pub mod handlers;

use anyhow::Result;
use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::info;

use crate::core::config::AppConfig;
use crate::fetcher::RateFetcher;

#[derive(Clone)]
pub struct AppState {
    pub fetcher: RateFetcher,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, fetcher: RateFetcher) -> Self {
        AppState {
            fetcher,
            config: Arc::new(config),
        }
    }
}

/// Builds the dashboard routes. The deployment target in the config selects
/// which backgrounds are listed; everything else is shared.
pub fn create_app(state: AppState) -> Router {
    let static_dir = state.config.static_path();

    Router::new()
        .route("/", get(handlers::index))
        .route("/api/config", get(handlers::config_json))
        .route("/currency", get(handlers::currency_page))
        .route("/assets/backgrounds.js", get(handlers::backgrounds_js))
        .route("/api/currency/list", get(handlers::currency_list))
        .route("/api/currency/current", get(handlers::current_rates))
        .route("/api/currency/history", get(handlers::currency_history))
        .route("/api/backgrounds/list", get(handlers::backgrounds_list))
        .nest_service(
            "/static/backgrounds",
            ServeDir::new(static_dir.join("backgrounds")),
        )
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: AppConfig) -> Result<()> {
    let fetcher = RateFetcher::from_config(&config)?;
    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let app = create_app(AppState::new(config, fetcher));

    info!("Starting server on {}", bind_address);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
