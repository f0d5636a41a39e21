// Admin REST API 핸들러
//
// 조회
//   GET /admin/status                    → 서버 상태 요약
//   GET /admin/rooms                     → 룸 전체 목록 (시청자 수 포함)
//   GET /admin/rooms/{room}              → 룸 상세
//
// 조작
//   POST /admin/rooms/{room}/deactivate  → 채팅 OFF. 기존 멤버는 유지, 신규 입장 차단
//   POST /admin/rooms/{room}/activate    → 채팅 ON

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::atomic::Ordering;
use tracing::warn;

use crate::core::{BusEvent, RoomSnapshot, Topic};
use crate::protocol::message::ChatFrame;
use crate::trace::{TraceDir, TraceEvent};
use crate::utils::current_timestamp;

use super::dto::*;
use super::state::HttpState;

// ----------------------------------------------------------------------------
// [유틸]
// ----------------------------------------------------------------------------

fn room_summary(state: &HttpState, snap: RoomSnapshot) -> AdminRoomSummary {
    let presence = snap.stream_id.as_deref().map(|id| state.presence.snapshot(id));
    AdminRoomSummary {
        room:         snap.room,
        stream_id:    snap.stream_id,
        member_count: snap.member_count,
        is_active:    snap.is_active,
        created_at:   snap.created_at,
        viewer_count: presence.map(|p| p.live),
        peak_viewers: presence.map(|p| p.peak),
    }
}

/// 토글 결과를 룸에 시스템 메시지로 알림
fn announce(state: &HttpState, room: &str, text: &str, kind: &str) {
    state.bus.publish(&Topic::Room(room.to_string()), BusEvent::Chat(ChatFrame::system(text)));
    state.trace_hub.publish(TraceEvent::new(TraceDir::Sys, Some(room), None, kind, text));
}

// ----------------------------------------------------------------------------
// [핸들러]
// ----------------------------------------------------------------------------

/// GET /admin/status
pub async fn admin_status(State(state): State<HttpState>) -> impl IntoResponse {
    let uptime_secs = current_timestamp().saturating_sub(state.start_time_ms) / 1000;
    let moderation  = state.moderation.load();
    let stats       = state.persist.stats();

    Json(ServerStatus {
        uptime_secs,
        connection_count:  state.connections.load(Ordering::Relaxed),
        room_count:        state.registry.count(),
        member_count:      state.registry.total_members(),
        topic_count:       state.bus.topic_count(),
        banned_word_count: moderation.banned_word_count(),
        timeout_count:     moderation.timeout_count(),
        moderation_loaded_at: moderation.loaded_at,
        persist_workers:   state.persist.worker_count(),
        persist_enqueued:  stats.enqueued.load(Ordering::Relaxed),
        persist_completed: stats.completed.load(Ordering::Relaxed),
        persist_failed:    stats.failed.load(Ordering::Relaxed),
        persist_dropped:   stats.dropped.load(Ordering::Relaxed),
    })
}

/// GET /admin/rooms
pub async fn admin_list_rooms(State(state): State<HttpState>) -> impl IntoResponse {
    let list: Vec<AdminRoomSummary> = state.registry
        .all_snapshots()
        .into_iter()
        .map(|snap| room_summary(&state, snap))
        .collect();
    Json(list)
}

/// GET /admin/rooms/{room}
pub async fn admin_get_room(
    State(state): State<HttpState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    match state.registry.snapshot(&room) {
        Some(snap) => Json(room_summary(&state, snap)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({
            "error": format!("Room not found: {}", room)
        }))).into_response(),
    }
}

/// POST /admin/rooms/{room}/deactivate
pub async fn admin_deactivate_room(
    State(state): State<HttpState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    let was_active = state.registry.force_deactivate(&room);
    warn!("[admin] deactivate room={} was_active={}", room, was_active);

    if was_active {
        announce(&state, &room, "Chat has been disabled", "deactivate");
    }

    Json(RoomToggleResult { ok: true, room, was_active, is_active: false })
}

/// POST /admin/rooms/{room}/activate
pub async fn admin_activate_room(
    State(state): State<HttpState>,
    Path(room): Path<String>,
) -> impl IntoResponse {
    let was_active = state.registry.reactivate(&room);
    warn!("[admin] activate room={} was_active={}", room, was_active);

    if !was_active {
        announce(&state, &room, "Chat has been enabled", "activate");
    }

    Json(RoomToggleResult { ok: true, room, was_active, is_active: true })
}
