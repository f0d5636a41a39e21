// 영속화 워커 풀
//
// 구조:
//   ConnectionHandler
//       └── PersistPool::enqueue_*(job)
//               └── mpsc::Sender (워커당 1개, (tenant, room) 해시로 선택)
//                       └── worker task → MessageStore
//
// - 같은 룸의 작업은 항상 같은 워커로 가므로 룸 단위 저장 순서가 유지됨
// - 워커는 커넥션 태스크와 독립. 커넥션이 끊겨도 이미 넣은 작업은 끝까지 수행
// - 저장 실패는 error! 로그 후 버림 (브로드캐스트는 이미 끝난 상태)

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::Identity;
use crate::error::{ChatError, ChatResult};
use crate::protocol::message::{MessageKind, StampId};
use crate::upstream::{MessageStore, TenantContext};

#[derive(Debug)]
pub enum PersistJob {
    AppendMessage {
        tenant:  TenantContext,
        room:    String,
        author:  Option<Identity>,
        content: String,
        kind:    MessageKind,
    },
    RecordReaction {
        tenant:    TenantContext,
        stream_id: String,
        author:    Identity,
        stamp_id:  StampId,
    },
}

impl PersistJob {
    fn shard_key(&self) -> (&str, &str) {
        match self {
            PersistJob::AppendMessage { tenant, room, .. }       => (tenant.schema(), room.as_str()),
            PersistJob::RecordReaction { tenant, stream_id, .. } => (tenant.schema(), stream_id.as_str()),
        }
    }
}

/// 처리 통계 (admin status 노출용)
#[derive(Debug, Default)]
pub struct PersistStats {
    pub enqueued:  AtomicU64,
    pub completed: AtomicU64,
    pub failed:    AtomicU64,
    pub dropped:   AtomicU64,
}

pub struct PersistPool {
    workers: Vec<mpsc::Sender<PersistJob>>,
    stats:   Arc<PersistStats>,
}

impl PersistPool {
    /// 워커 태스크를 띄우고 풀 핸들 반환. tokio 런타임 안에서 호출해야 함
    pub fn spawn(store: Arc<dyn MessageStore>, worker_count: usize, queue_size: usize) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let stats = Arc::new(PersistStats::default());

        let workers = (0..worker_count)
            .map(|index| {
                let (tx, rx) = mpsc::channel(queue_size.max(1));
                tokio::spawn(run_worker(index, rx, Arc::clone(&store), Arc::clone(&stats)));
                tx
            })
            .collect();

        info!("[persist] {} worker(s) started (queue={})", worker_count, queue_size);
        Arc::new(Self { workers, stats })
    }

    pub fn stats(&self) -> &PersistStats {
        &self.stats
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn worker_for(&self, job: &PersistJob) -> &mpsc::Sender<PersistJob> {
        let (tenant, key) = job.shard_key();
        &self.workers[worker_index(tenant, key, self.workers.len())]
    }

    /// 채팅 메시지: 큐가 차면 이 커넥션만 대기 (다른 커넥션 수신 루프는 영향 없음)
    pub async fn enqueue_message(&self, job: PersistJob) -> ChatResult<()> {
        let worker = self.worker_for(&job);
        worker.send(job).await
            .map_err(|_| ChatError::UpstreamUnavailable("persist queue closed".to_string()))?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 리액션: best-effort. 큐가 차면 버림. 반환값: 적재 여부
    pub fn try_enqueue_reaction(&self, job: PersistJob) -> bool {
        match self.worker_for(&job).try_send(job) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("[persist] queue full, reaction dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("[persist] queue closed, reaction dropped");
                false
            }
        }
    }
}

/// (tenant, key) → 워커 인덱스. 같은 입력이면 항상 같은 워커
pub fn worker_index(tenant: &str, key: &str, worker_count: usize) -> usize {
    if worker_count == 0 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    tenant.hash(&mut hasher);
    key.hash(&mut hasher);
    (hasher.finish() as usize) % worker_count
}

async fn run_worker(
    index: usize,
    mut rx: mpsc::Receiver<PersistJob>,
    store:  Arc<dyn MessageStore>,
    stats:  Arc<PersistStats>,
) {
    while let Some(job) = rx.recv().await {
        let result = match &job {
            PersistJob::AppendMessage { tenant, room, author, content, kind } => store
                .append_message(tenant, room, author.as_ref(), content, *kind)
                .await
                .map(|id| debug!("[persist] worker={} room={} message id={}", index, room, id)),
            PersistJob::RecordReaction { tenant, stream_id, author, stamp_id } => store
                .record_reaction(tenant, stream_id, author, stamp_id)
                .await
                .map(|_| debug!("[persist] worker={} stream={} reaction {}", index, stream_id, stamp_id)),
        };

        match result {
            Ok(()) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                error!("[persist] worker={} job dropped: {} ({:?})", index, e, job);
            }
        }
    }
    debug!("[persist] worker={} stopped", index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MemoryUpstream;
    use std::time::Duration;

    fn tenant() -> TenantContext {
        TenantContext::new("public")
    }

    async fn wait_for(pred: impl Fn() -> bool) {
        for _ in 0..100 {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[test]
    fn worker_index_is_stable() {
        assert_eq!(worker_index("public", "stream_42", 4), worker_index("public", "stream_42", 4));
        assert_eq!(worker_index("public", "stream_42", 0), 0);
        assert!(worker_index("public", "lobby", 3) < 3);
    }

    #[tokio::test]
    async fn messages_reach_store_in_room_order() {
        let mem = Arc::new(MemoryUpstream::new());
        let pool = PersistPool::spawn(mem.clone(), 4, 16);

        for n in 0..20 {
            pool.enqueue_message(PersistJob::AppendMessage {
                tenant:  tenant(),
                room:    "lobby".into(),
                author:  Some(Identity::authenticated("1", "alice")),
                content: format!("m{}", n),
                kind:    MessageKind::Message,
            }).await.unwrap();
        }

        wait_for(|| mem.messages().len() == 20).await;
        let contents: Vec<String> = mem.messages().into_iter().map(|m| m.content).collect();
        let expected: Vec<String> = (0..20).map(|n| format!("m{}", n)).collect();
        assert_eq!(contents, expected);
        assert_eq!(pool.stats().enqueued.load(Ordering::Relaxed), 20);
    }

    #[tokio::test]
    async fn failed_write_is_counted_and_dropped() {
        let mem = Arc::new(MemoryUpstream::new());
        mem.set_unavailable(true);
        let pool = PersistPool::spawn(mem.clone(), 1, 4);

        pool.enqueue_message(PersistJob::AppendMessage {
            tenant:  tenant(),
            room:    "lobby".into(),
            author:  None,
            content: "lost".into(),
            kind:    MessageKind::System,
        }).await.unwrap();

        wait_for(|| pool.stats().failed.load(Ordering::Relaxed) == 1).await;
        assert!(mem.messages().is_empty());
    }

    #[tokio::test]
    async fn reaction_for_unknown_stream_fails_quietly() {
        let mem = Arc::new(MemoryUpstream::new());
        let pool = PersistPool::spawn(mem.clone(), 1, 4);

        assert!(pool.try_enqueue_reaction(PersistJob::RecordReaction {
            tenant:    tenant(),
            stream_id: "404".into(),
            author:    Identity::authenticated("1", "alice"),
            stamp_id:  StampId::Num(1),
        }));
        wait_for(|| pool.stats().failed.load(Ordering::Relaxed) == 1).await;
        assert!(mem.reactions().is_empty());
    }
}
