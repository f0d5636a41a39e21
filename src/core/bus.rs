// BroadcastBus: 룸 토픽 단위 pub/sub 팬아웃
//
// 구조:
//   ConnectionHandler (publish)
//       └── BroadcastBus::publish(topic, event)
//               └── broadcast::Sender  (토픽당 1개, 구독자 수에 무관하게 O(1) publish)
//                       ├── Subscription (conn 1, 발신자 본인 포함)
//                       └── Subscription (conn N)
//
// - 토픽 하나 안에서는 모든 구독자가 같은 순서로 이벤트를 봄 (send가 토픽 내 직렬화)
// - publish는 느린 구독자를 기다리지 않음. 밀린 구독자는 Lagged로 건너뜀
// - 같은 프로세스 구독자라도 반드시 버스를 거쳐 전달 (로컬 지름길 없음)

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use crate::protocol::message::{ChatFrame, ReactionFrame};

// ----------------------------------------------------------------------------
// [Topic]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// 룸 채팅/리액션/입퇴장
    Room(String),
    /// 스트림 시청자 수 전용
    Presence(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Room(room)          => write!(f, "chat_{}", room),
            Topic::Presence(stream_id) => write!(f, "viewers_{}", stream_id),
        }
    }
}

// ----------------------------------------------------------------------------
// [BusEvent] 송신 프레임 종류별 태그 유니온
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum BusEvent {
    /// message / join / leave / system
    Chat(ChatFrame),
    Reaction(ReactionFrame),
    ViewerCount { count: u64 },
}

impl BusEvent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            BusEvent::Chat(frame)       => frame.message_type.as_str(),
            BusEvent::Reaction(_)       => "reaction",
            BusEvent::ViewerCount { .. } => "viewer_count",
        }
    }
}

// ----------------------------------------------------------------------------
// [Subscription]
// ----------------------------------------------------------------------------

pub struct Subscription {
    pub id:    u64,
    pub topic: Topic,
    rx:        broadcast::Receiver<Arc<BusEvent>>,
}

impl Subscription {
    /// 다음 이벤트. 토픽이 닫히면 None
    /// 버퍼 초과로 밀린 경우 유실분을 건너뛰고 이어서 수신 (상대 순서는 유지)
    pub async fn recv(&mut self) -> Option<Arc<BusEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[bus] sub={} topic={} lagged, skipped {} event(s)", self.id, self.topic, skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

// ----------------------------------------------------------------------------
// [BroadcastBus]
// ----------------------------------------------------------------------------

pub struct BroadcastBus {
    topics:   RwLock<HashMap<Topic, broadcast::Sender<Arc<BusEvent>>>>,
    capacity: usize,
    next_sub: AtomicU64,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        trace!("Initializing BroadcastBus (capacity={})", capacity);
        Self {
            topics:   RwLock::new(HashMap::new()),
            capacity,
            next_sub: AtomicU64::new(1),
        }
    }

    /// 구독자가 없으면 조용히 drop. 반환값: 이벤트를 받을 구독자 수
    pub fn publish(&self, topic: &Topic, event: BusEvent) -> usize {
        let kind = event.kind_name();
        let topics = self.topics.read().unwrap();
        let delivered = match topics.get(topic) {
            Some(tx) => tx.send(Arc::new(event)).unwrap_or(0),
            None     => 0,
        };
        trace!("[bus] publish topic={} kind={} receivers={}", topic, kind, delivered);
        delivered
    }

    pub fn subscribe(&self, topic: &Topic) -> Subscription {
        let id = self.next_sub.fetch_add(1, Ordering::Relaxed);

        if let Some(tx) = self.topics.read().unwrap().get(topic) {
            trace!("[bus] subscribe sub={} topic={}", id, topic);
            return Subscription { id, topic: topic.clone(), rx: tx.subscribe() };
        }

        let mut topics = self.topics.write().unwrap();
        let tx = topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        trace!("[bus] subscribe sub={} topic={} (new topic)", id, topic);
        Subscription { id, topic: topic.clone(), rx: tx.subscribe() }
    }

    /// 구독 해제. 마지막 구독자가 나가면 토픽 자체를 정리
    pub fn unsubscribe(&self, topic: &Topic, subscription: Subscription) {
        debug_assert_eq!(&subscription.topic, topic);
        let id = subscription.id;
        drop(subscription);

        let mut topics = self.topics.write().unwrap();
        if topics.get(topic).is_some_and(|tx| tx.receiver_count() == 0) {
            topics.remove(topic);
            trace!("[bus] topic={} pruned", topic);
        }
        trace!("[bus] unsubscribe sub={} topic={}", id, topic);
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.read().unwrap().get(topic).map_or(0, |tx| tx.receiver_count())
    }

    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap().len()
    }
}
