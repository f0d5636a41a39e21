// HTTP 응답 DTO: Admin / 일반 조회 공용

use serde::Serialize;

// ----------------------------------------------------------------------------
// [일반 조회]
// ----------------------------------------------------------------------------

/// GET /rooms/{room}
#[derive(Serialize)]
pub struct RoomStatus {
    pub room:         String,
    pub member_count: usize,
    pub is_active:    bool,
}

// ----------------------------------------------------------------------------
// [Admin]
// ----------------------------------------------------------------------------

/// GET /admin/status
#[derive(Serialize)]
pub struct ServerStatus {
    pub uptime_secs:       u64,
    pub connection_count:  usize,
    pub room_count:        usize,
    pub member_count:      usize,
    pub topic_count:       usize,
    pub banned_word_count: usize,
    pub timeout_count:     usize,
    /// 모더레이션 스냅샷 로드 시각 (Unix millis)
    pub moderation_loaded_at: u64,
    pub persist_workers:   usize,
    pub persist_enqueued:  u64,
    pub persist_completed: u64,
    pub persist_failed:    u64,
    pub persist_dropped:   u64,
}

/// GET /admin/rooms 아이템, GET /admin/rooms/{room}
#[derive(Serialize)]
pub struct AdminRoomSummary {
    pub room:         String,
    pub stream_id:    Option<String>,
    pub member_count: usize,
    pub is_active:    bool,
    pub created_at:   u64,
    /// 스트림 룸만 값이 있음
    pub viewer_count: Option<u64>,
    pub peak_viewers: Option<u64>,
}

/// POST /admin/rooms/{room}/deactivate|activate
#[derive(Serialize)]
pub struct RoomToggleResult {
    pub ok:         bool,
    pub room:       String,
    pub was_active: bool,
    pub is_active:  bool,
}
