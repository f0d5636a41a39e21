// TraceHub: 채팅 이벤트 실시간 관찰 버스
//
// 구조:
//   ConnectionHandler / sweeper / admin API
//       └── TraceHub::publish(event)
//               └── broadcast::Sender
//                       ├── SSE subscriber (chattrace 프로세스 1)
//                       └── SSE subscriber (chattrace 프로세스 2)
//
// 구독자가 없을 때 publish는 그냥 drop
// 구독자가 느리면 lagged. SSE 핸들러 쪽에서 건너뜀

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::utils::current_timestamp;

/// 구독자가 느릴 때 최대 보유 이벤트 수
const TRACE_BUF: usize = 512;

/// 이벤트 방향
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TraceDir {
    /// 클라이언트 → 서버
    In,
    /// 서버 → 클라이언트
    Out,
    /// 서버 내부
    Sys,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent {
    /// Unix millis
    pub ts:      u64,
    pub dir:     TraceDir,
    pub room:    Option<String>,
    pub user_id: Option<String>,
    /// 예: "join", "message", "rejected", "reaction", "viewer_count", "deactivate"
    pub kind:    String,
    pub summary: String,
}

impl TraceEvent {
    pub fn new(
        dir:     TraceDir,
        room:    Option<&str>,
        user_id: Option<&str>,
        kind:    &str,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            ts:      current_timestamp(),
            dir,
            room:    room.map(str::to_string),
            user_id: user_id.filter(|id| !id.is_empty()).map(str::to_string),
            kind:    kind.to_string(),
            summary: summary.into(),
        }
    }
}

pub struct TraceHub {
    tx: broadcast::Sender<TraceEvent>,
}

impl TraceHub {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(TRACE_BUF);
        Arc::new(Self { tx })
    }

    pub fn publish(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }

    /// SSE 연결마다 호출
    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }
}
