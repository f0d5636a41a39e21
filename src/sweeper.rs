// 주기 백그라운드 태스크
//
//   run_moderation_refresh  : 금칙어/타임아웃 스냅샷 갱신
//   run_presence_reconciler : 스트림 시청자 수를 룸 실제 멤버 수로 보정

use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::config;
use crate::core::{ModerationCache, PresenceTracker, RoomRegistry};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::upstream::{StreamDirectory, TenantContext};

pub async fn run_moderation_refresh(cache: Arc<ModerationCache>, tenant: TenantContext) {
    let mut timer = interval(Duration::from_millis(config::MODERATION_REFRESH_INTERVAL_MS));
    timer.tick().await; // 첫 틱 skip (시작 시 1회 로드는 run_server 에서)

    info!("[moderation-refresh] Started (interval={}ms)", config::MODERATION_REFRESH_INTERVAL_MS);

    loop {
        timer.tick().await;
        if let Err(e) = cache.refresh(&tenant).await {
            warn!("[moderation-refresh] keeping previous snapshot: {}", e);
        }
    }
}

pub async fn run_presence_reconciler(
    registry:  Arc<RoomRegistry>,
    presence:  Arc<PresenceTracker>,
    streams:   Arc<dyn StreamDirectory>,
    trace_hub: Arc<TraceHub>,
    tenant:    TenantContext,
) {
    let mut timer = interval(Duration::from_millis(config::PRESENCE_RECONCILE_INTERVAL_MS));
    timer.tick().await;

    info!("[presence-reconciler] Started (interval={}ms)", config::PRESENCE_RECONCILE_INTERVAL_MS);

    loop {
        timer.tick().await;
        let corrected = reconcile_once(&registry, &presence, streams.as_ref(), &trace_hub, &tenant).await;
        if corrected > 0 {
            info!("[presence-reconciler] Corrected {} stream(s)", corrected);
        }
    }
}

/// 한 바퀴 보정. 반환값: 값이 바뀐 스트림 수
pub async fn reconcile_once(
    registry:  &RoomRegistry,
    presence:  &PresenceTracker,
    streams:   &dyn StreamDirectory,
    trace_hub: &TraceHub,
    tenant:    &TenantContext,
) -> usize {
    let mut corrected = 0;

    for room in registry.stream_rooms() {
        let Some(stream_id) = room.stream_id.as_deref() else { continue };
        let actual = room.member_count() as u64;

        if presence.reconcile(stream_id, actual) {
            corrected += 1;
            trace_hub.publish(TraceEvent::new(
                TraceDir::Sys, Some(room.name.as_str()), None, "viewer_count",
                format!("reconciled to {}", actual),
            ));
        }

        let snap = presence.snapshot(stream_id);
        if let Err(e) = streams.update_viewer_count(tenant, stream_id, snap.live, snap.peak).await {
            debug!("[presence-reconciler] stream={} count not persisted: {}", stream_id, e);
        }
    }

    corrected
}
