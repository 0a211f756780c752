pub mod api;
pub mod config;
pub mod connections;
pub mod error;
pub mod fair_queue;
pub mod progress;
pub mod room;
pub mod room_manager;
pub mod state;
pub mod ws;

use axum::Router;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route(
            "/api/game-connection",
            axum::routing::get(ws::ws_handler),
        )
        .route("/api/room/{room_id}", axum::routing::get(api::get_room))
        .route("/api/status", axum::routing::get(api::get_status))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}
