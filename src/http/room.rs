// 일반 룸 조회 핸들러
//   GET /rooms/{room} → { room, member_count, is_active }

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::dto::RoomStatus;
use super::state::HttpState;

/// GET /rooms/{room}
/// 아직 아무도 입장하지 않은 룸은 404 (조회만으로 룸을 만들지 않음)
pub async fn get_room_snapshot(
    State(state): State<HttpState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    match state.registry.snapshot(&room) {
        Some(snap) => Json(RoomStatus {
            room:         snap.room,
            member_count: snap.member_count,
            is_active:    snap.is_active,
        }).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({
            "error": format!("Room not found: {}", room)
        }))).into_response(),
    }
}
