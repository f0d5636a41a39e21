// RoomRegistry: 룸 이름 → 룸 상태 + 멤버(커넥션) 목록 관리

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, trace};

use crate::config;
use crate::error::{ChatError, ChatResult};
use crate::upstream::{StreamDirectory, TenantContext};
use crate::utils::current_timestamp;

/// 프로세스 내 커넥션 식별자
pub type ConnId = u64;

// ----------------------------------------------------------------------------
// [룸 종류]
//   Stream : "stream_<id>" 접두사, 존재/활성 여부는 스트림 레코드에서 파생
//   Generic: 그 외 이름, 생성 시 활성, 외부 토글 전까지 유지
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomKind {
    Stream(String),
    Generic,
}

impl RoomKind {
    pub fn parse(name: &str) -> Self {
        match name.strip_prefix(config::STREAM_ROOM_PREFIX) {
            Some(stream_id) => RoomKind::Stream(stream_id.to_string()),
            None            => RoomKind::Generic,
        }
    }
}

#[derive(Debug)]
pub struct Room {
    pub name:       String,
    pub stream_id:  Option<String>,
    pub created_at: u64,
    /// 관리자 토글
    active:         AtomicBool,
    /// 마지막으로 조회한 스트림 enable_chat (일반 룸은 항상 true)
    stream_chat:    AtomicBool,
    members:        RwLock<HashSet<ConnId>>,
}

impl Room {
    pub fn new(name: String, stream_id: Option<String>) -> Self {
        trace!("Creating Room: {} stream={:?}", name, stream_id);
        Self {
            name,
            stream_id,
            created_at:  current_timestamp(),
            active:      AtomicBool::new(true),
            stream_chat: AtomicBool::new(true),
            members:     RwLock::new(HashSet::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// 이전 값을 반환. 비활성화해도 기존 멤버는 내보내지 않음
    pub fn set_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    fn observe_stream_chat(&self, enabled: bool) {
        self.stream_chat.store(enabled, Ordering::Release);
    }

    pub fn add_member(&self, conn_id: ConnId) -> bool {
        self.add_member_with(conn_id, |_| {})
    }

    pub fn remove_member(&self, conn_id: ConnId) -> bool {
        self.remove_member_with(conn_id, |_| {})
    }

    /// on_change 는 멤버 락을 쥔 채로 변경 후 멤버 수를 받음.
    /// 같은 룸의 입퇴장은 이 순서대로 관찰됨
    pub fn add_member_with(&self, conn_id: ConnId, on_change: impl FnOnce(usize)) -> bool {
        let mut members = self.members.write().unwrap();
        let inserted = members.insert(conn_id);
        on_change(members.len());
        trace!("Conn {} joined Room {}", conn_id, self.name);
        inserted
    }

    pub fn remove_member_with(&self, conn_id: ConnId, on_change: impl FnOnce(usize)) -> bool {
        let mut members = self.members.write().unwrap();
        let removed = members.remove(&conn_id);
        on_change(members.len());
        trace!("Conn {} left Room {}", conn_id, self.name);
        removed
    }

    pub fn member_count(&self) -> usize {
        self.members.read().unwrap().len()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room:         self.name.clone(),
            stream_id:    self.stream_id.clone(),
            member_count: self.member_count(),
            is_active:    self.is_active() && self.stream_chat.load(Ordering::Acquire),
            created_at:   self.created_at,
        }
    }
}

/// get_room_snapshot 응답 (대시보드용)
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room:         String,
    pub stream_id:    Option<String>,
    pub member_count: usize,
    pub is_active:    bool,
    pub created_at:   u64,
}

// ----------------------------------------------------------------------------
// [RoomRegistry]
// ----------------------------------------------------------------------------

pub struct RoomRegistry {
    rooms:   RwLock<HashMap<String, Arc<Room>>>,
    streams: Arc<dyn StreamDirectory>,
}

impl RoomRegistry {
    pub fn new(streams: Arc<dyn StreamDirectory>) -> Self {
        trace!("Initializing RoomRegistry");
        Self { rooms: RwLock::new(HashMap::new()), streams }
    }

    /// 멱등 get-or-create. 동시에 같은 이름으로 들어와도 룸 객체는 하나
    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.read().unwrap().get(name) {
            return Arc::clone(room);
        }

        let mut rooms = self.rooms.write().unwrap();
        let room = rooms.entry(name.to_string()).or_insert_with(|| {
            let stream_id = match RoomKind::parse(name) {
                RoomKind::Stream(id) => Some(id),
                RoomKind::Generic    => None,
            };
            info!("[room] created: {}", name);
            Arc::new(Room::new(name.to_string(), stream_id))
        });
        Arc::clone(room)
    }

    /// 입장 가능한 룸 확보. 스트림 룸은 스트림이 없으면 절대 생성하지 않음
    pub async fn join(&self, tenant: &TenantContext, name: &str) -> ChatResult<Arc<Room>> {
        match RoomKind::parse(name) {
            RoomKind::Stream(stream_id) => {
                if stream_id.is_empty() {
                    return Err(ChatError::RoomNotFound(name.to_string()));
                }
                let info = self.streams.get_stream(tenant, &stream_id).await?;
                if !info.exists {
                    return Err(ChatError::RoomNotFound(name.to_string()));
                }
                let room = self.get_or_create(name);
                room.observe_stream_chat(info.enable_chat);
                if !info.enable_chat || !room.is_active() {
                    return Err(ChatError::RoomInactive(name.to_string()));
                }
                Ok(room)
            }
            RoomKind::Generic => {
                let room = self.get_or_create(name);
                if !room.is_active() {
                    return Err(ChatError::RoomInactive(name.to_string()));
                }
                Ok(room)
            }
        }
    }

    /// 멤버 제거. 활성 일반 룸이 비면 레지스트리에서도 제거 (반환값: 제거 여부)
    /// 비활성 룸(토글 마커)과 스트림 룸은 남김
    pub fn leave(&self, room: &Arc<Room>, conn_id: ConnId, on_change: impl FnOnce(usize)) -> bool {
        room.remove_member_with(conn_id, on_change);
        if room.stream_id.is_some() || !room.is_active() {
            return false;
        }

        let mut rooms = self.rooms.write().unwrap();
        // 이 핸들 + 맵 외에 참조가 있으면 입장 진행 중인 커넥션이 있음
        let idle = room.member_count() == 0 && Arc::strong_count(room) <= 2;
        let same = rooms.get(&room.name).is_some_and(|r| Arc::ptr_eq(r, room));
        if idle && same && room.is_active() {
            rooms.remove(&room.name);
            info!("[room] pruned empty room: {}", room.name);
            return true;
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().unwrap().get(name).cloned()
    }

    pub fn snapshot(&self, name: &str) -> Option<RoomSnapshot> {
        self.get(name).map(|r| r.snapshot())
    }

    pub fn all_snapshots(&self) -> Vec<RoomSnapshot> {
        let mut list: Vec<RoomSnapshot> = self.rooms.read().unwrap()
            .values()
            .map(|r| r.snapshot())
            .collect();
        list.sort_by(|a, b| a.room.cmp(&b.room));
        list
    }

    /// 스트림 소유자의 채팅 토글(OFF). 아직 없는 룸이면 비활성 상태로 만들어 둠
    /// 반환값: 호출 전 활성 여부
    pub fn force_deactivate(&self, name: &str) -> bool {
        let was_active = self.get_or_create(name).set_active(false);
        info!("[room] deactivated: {} (was_active={})", name, was_active);
        was_active
    }

    /// 채팅 토글(ON)
    pub fn reactivate(&self, name: &str) -> bool {
        let was_active = self.get_or_create(name).set_active(true);
        info!("[room] reactivated: {} (was_active={})", name, was_active);
        was_active
    }

    pub fn stream_rooms(&self) -> Vec<Arc<Room>> {
        self.rooms.read().unwrap()
            .values()
            .filter(|r| r.stream_id.is_some())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.rooms.read().unwrap().len()
    }

    pub fn total_members(&self) -> usize {
        self.rooms.read().unwrap().values().map(|r| r.member_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MemoryUpstream;

    fn registry() -> (Arc<MemoryUpstream>, RoomRegistry) {
        let mem = Arc::new(MemoryUpstream::new());
        let reg = RoomRegistry::new(mem.clone());
        (mem, reg)
    }

    fn tenant() -> TenantContext {
        TenantContext::new("public")
    }

    #[test]
    fn room_kind_parse() {
        assert_eq!(RoomKind::parse("stream_42"), RoomKind::Stream("42".into()));
        assert_eq!(RoomKind::parse("lobby"), RoomKind::Generic);
        assert_eq!(RoomKind::parse("streaming"), RoomKind::Generic);
    }

    #[test]
    fn get_or_create_returns_existing() {
        let (_, reg) = registry();
        let a = reg.get_or_create("lobby");
        let b = reg.get_or_create("lobby");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.count(), 1);
    }

    #[tokio::test]
    async fn join_missing_stream_is_not_found_and_not_created() {
        let (_, reg) = registry();
        let err = reg.join(&tenant(), "stream_XYZ").await.unwrap_err();
        assert!(matches!(err, ChatError::RoomNotFound(_)));
        assert!(reg.get("stream_XYZ").is_none());
    }

    #[tokio::test]
    async fn join_stream_with_chat_disabled_is_inactive() {
        let (mem, reg) = registry();
        mem.add_stream("7", true, false);
        let err = reg.join(&tenant(), "stream_7").await.unwrap_err();
        assert!(matches!(err, ChatError::RoomInactive(_)));
    }

    #[tokio::test]
    async fn join_existing_stream_binds_room() {
        let (mem, reg) = registry();
        mem.add_stream("42", true, true);
        let room = reg.join(&tenant(), "stream_42").await.unwrap();
        assert_eq!(room.stream_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn join_with_upstream_down_is_upstream_error() {
        let (mem, reg) = registry();
        mem.set_unavailable(true);
        let err = reg.join(&tenant(), "stream_42").await.unwrap_err();
        assert!(matches!(err, ChatError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn deactivated_room_rejects_new_joins_but_keeps_members() {
        let (_, reg) = registry();
        let room = reg.join(&tenant(), "lobby").await.unwrap();
        room.add_member(1);

        assert!(reg.force_deactivate("lobby"));
        let err = reg.join(&tenant(), "lobby").await.unwrap_err();
        assert!(matches!(err, ChatError::RoomInactive(_)));
        assert_eq!(room.member_count(), 1);

        reg.reactivate("lobby");
        assert!(reg.join(&tenant(), "lobby").await.is_ok());
    }

    #[test]
    fn members_add_remove_and_snapshot() {
        let (_, reg) = registry();
        let room = reg.get_or_create("lobby");
        assert!(room.add_member(1));
        assert!(room.add_member(2));
        assert!(!room.add_member(2));
        assert!(room.remove_member(1));

        let snap = reg.snapshot("lobby").unwrap();
        assert_eq!(snap.member_count, 1);
        assert!(snap.is_active);
        assert!(reg.snapshot("nope").is_none());
    }

    #[test]
    fn stream_rooms_filters_generic() {
        let (_, reg) = registry();
        reg.get_or_create("lobby");
        reg.get_or_create("stream_1");
        let rooms = reg.stream_rooms();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "stream_1");
    }

    #[tokio::test]
    async fn last_leave_prunes_active_generic_room() {
        let (_, reg) = registry();
        let room = reg.join(&tenant(), "lobby").await.unwrap();
        room.add_member(1);
        room.add_member(2);

        assert!(!reg.leave(&room, 1, |_| {}));
        assert_eq!(reg.count(), 1);
        assert!(reg.leave(&room, 2, |_| {}));
        assert_eq!(reg.count(), 0);
        assert!(reg.snapshot("lobby").is_none());
    }

    #[tokio::test]
    async fn leave_keeps_room_while_another_join_holds_it() {
        let (_, reg) = registry();
        let room = reg.join(&tenant(), "lobby").await.unwrap();
        let pending = reg.join(&tenant(), "lobby").await.unwrap();
        room.add_member(1);

        assert!(!reg.leave(&room, 1, |_| {}));
        assert!(Arc::ptr_eq(&reg.get("lobby").unwrap(), &pending));
    }

    #[tokio::test]
    async fn leave_keeps_deactivated_and_stream_rooms() {
        let (mem, reg) = registry();
        mem.add_stream("42", true, true);

        let lobby = reg.join(&tenant(), "lobby").await.unwrap();
        lobby.add_member(1);
        reg.force_deactivate("lobby");
        assert!(!reg.leave(&lobby, 1, |_| {}));

        let stream = reg.join(&tenant(), "stream_42").await.unwrap();
        stream.add_member(2);
        assert!(!reg.leave(&stream, 2, |_| {}));

        assert_eq!(reg.count(), 2);
        assert!(!reg.snapshot("lobby").unwrap().is_active);
    }

    #[test]
    fn member_callbacks_see_post_change_count() {
        let (_, reg) = registry();
        let room = reg.get_or_create("lobby");
        let mut seen = Vec::new();
        room.add_member_with(1, |n| seen.push(n));
        room.add_member_with(2, |n| seen.push(n));
        room.remove_member_with(1, |n| seen.push(n));
        assert_eq!(seen, vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn snapshot_reflects_stream_chat_flag() {
        let (mem, reg) = registry();
        mem.add_stream("7", true, false);
        assert!(reg.join(&tenant(), "stream_7").await.is_err());
        assert!(!reg.snapshot("stream_7").unwrap().is_active);

        mem.add_stream("7", true, true);
        assert!(reg.join(&tenant(), "stream_7").await.is_ok());
        assert!(reg.snapshot("stream_7").unwrap().is_active);
    }
}
