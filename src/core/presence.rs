// PresenceTracker: 스트림별 실시간 시청자 수 + 최고 시청자 수(워터마크)
//
// 카운터는 입퇴장 시점에 룸 멤버 락 안에서 읽은 실제 멤버 수로 갱신됩니다.
// 주기적 재조정(sweeper)이 룸의 현재 멤버 수로 한 번 더 맞춥니다.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

use super::bus::{BroadcastBus, BusEvent, Topic};

#[derive(Default)]
struct StreamPresence {
    live: AtomicU64,
    /// 단조 비감소
    peak: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresenceSnapshot {
    pub live: u64,
    pub peak: u64,
}

pub struct PresenceTracker {
    streams: RwLock<HashMap<String, Arc<StreamPresence>>>,
    bus:     Arc<BroadcastBus>,
}

impl PresenceTracker {
    pub fn new(bus: Arc<BroadcastBus>) -> Self {
        trace!("Initializing PresenceTracker");
        Self { streams: RwLock::new(HashMap::new()), bus }
    }

    fn entry(&self, stream_id: &str) -> Arc<StreamPresence> {
        if let Some(p) = self.streams.read().unwrap().get(stream_id) {
            return Arc::clone(p);
        }
        let mut streams = self.streams.write().unwrap();
        Arc::clone(streams.entry(stream_id.to_string()).or_default())
    }

    fn publish(&self, stream_id: &str, count: u64) {
        self.bus.publish(&Topic::Presence(stream_id.to_string()), BusEvent::ViewerCount { count });
    }

    /// Joining → Active. members 는 룸 멤버 락 안에서 읽은 입장 후 멤버 수
    pub fn joined(&self, stream_id: &str, members: usize) -> u64 {
        let live = self.store_live(stream_id, members as u64);
        debug!("[presence] stream={} +1 live={}", stream_id, live);
        live
    }

    /// Active → Closing. members 는 퇴장 후 멤버 수
    pub fn left(&self, stream_id: &str, members: usize) -> u64 {
        let live = self.store_live(stream_id, members as u64);
        debug!("[presence] stream={} -1 live={}", stream_id, live);
        live
    }

    /// peak 은 실제로 관찰된 멤버 수로만 올라감
    fn store_live(&self, stream_id: &str, live: u64) -> u64 {
        let p = self.entry(stream_id);
        p.live.store(live, Ordering::Release);
        p.peak.fetch_max(live, Ordering::AcqRel);
        self.publish(stream_id, live);
        live
    }

    /// 실제 구독자 수로 보정. 값이 바뀐 경우에만 publish. 반환값: 보정 여부
    pub fn reconcile(&self, stream_id: &str, actual: u64) -> bool {
        let p = self.entry(stream_id);
        let prev = p.live.swap(actual, Ordering::AcqRel);
        p.peak.fetch_max(actual, Ordering::AcqRel);
        if prev != actual {
            debug!("[presence] stream={} drift corrected {} -> {}", stream_id, prev, actual);
            self.publish(stream_id, actual);
            return true;
        }
        false
    }

    pub fn snapshot(&self, stream_id: &str) -> PresenceSnapshot {
        match self.streams.read().unwrap().get(stream_id) {
            Some(p) => PresenceSnapshot {
                live: p.live.load(Ordering::Acquire),
                peak: p.peak.load(Ordering::Acquire),
            },
            None => PresenceSnapshot { live: 0, peak: 0 },
        }
    }

    pub fn count(&self, stream_id: &str) -> u64 {
        self.snapshot(stream_id).live
    }
}
