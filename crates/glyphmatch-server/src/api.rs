use axum::extract::{Path, State};
use axum::response::Json;
use serde::Serialize;

use glyphmatch_core::net::messages::RoomSnapshot;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/room/{room_id}: read-only room projection. Browsers call this
/// on every `Update` signal.
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    state
        .rooms
        .snapshot(&room_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub rooms: usize,
    pub connections: usize,
}

/// GET /api/status: room and connection counts.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        rooms: state.rooms.room_count(),
        connections: state.connections.len(),
    })
}
