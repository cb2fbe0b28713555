mod handlers;
mod state;

pub use state::AppState;

use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/resolve", get(handlers::resolve))
        .route("/api/suggest", get(handlers::suggest))
        .route("/api/city", get(handlers::city_centre))
        .route("/api/cities", get(handlers::city_list))
        .route("/api/areas", get(handlers::area_list))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(state: Arc<AppState>) -> std::io::Result<()> {
    state.areas.refresh_in_background();

    let addr = state.config.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, build_router(state)).await
}
