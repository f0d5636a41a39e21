// HttpState: HTTP 핸들러 공유 상태 (WS AppState 에서 필요한 허브만 추림)

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use crate::core::{BroadcastBus, ModerationCache, PresenceTracker, RoomRegistry};
use crate::persist::PersistPool;
use crate::protocol::AppState;
use crate::trace::TraceHub;
use crate::utils::current_timestamp;

#[derive(Clone)]
pub struct HttpState {
    pub registry:      Arc<RoomRegistry>,
    pub bus:           Arc<BroadcastBus>,
    pub presence:      Arc<PresenceTracker>,
    pub moderation:    Arc<ModerationCache>,
    pub persist:       Arc<PersistPool>,
    pub trace_hub:     Arc<TraceHub>,
    pub connections:   Arc<AtomicUsize>,
    /// 서버 프로세스 시작 시각 (Unix millis), uptime 계산용
    pub start_time_ms: u64,
}

impl HttpState {
    pub fn from_app(app: &AppState) -> Self {
        Self {
            registry:      Arc::clone(&app.registry),
            bus:           Arc::clone(&app.bus),
            presence:      Arc::clone(&app.presence),
            moderation:    Arc::clone(&app.moderation),
            persist:       Arc::clone(&app.persist),
            trace_hub:     Arc::clone(&app.trace_hub),
            connections:   Arc::clone(&app.connections),
            start_time_ms: current_timestamp(),
        }
    }
}
