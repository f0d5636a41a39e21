// HTTP REST API
//
// GET  /rooms/{room}                    → 룸 스냅샷 (대시보드)
// GET  /admin/status                    → 서버 상태 요약
// GET  /admin/rooms                     → 룸 전체 목록
// GET  /admin/rooms/{room}              → 룸 상세
// POST /admin/rooms/{room}/deactivate   → 채팅 OFF (신규 입장 차단)
// POST /admin/rooms/{room}/activate     → 채팅 ON
// GET  /trace, /trace/{room}            → SSE 이벤트 스트림

pub mod admin;
pub mod dto;
pub mod room;
pub mod state;
pub mod trace;

pub use admin::{admin_activate_room, admin_deactivate_room, admin_get_room, admin_list_rooms, admin_status};
pub use room::get_room_snapshot;
pub use state::HttpState;
pub use trace::trace_stream;
