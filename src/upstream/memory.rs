// MemoryUpstream: 단독 실행 및 테스트용 인메모리 협력자 구현

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::trace;

use crate::core::Identity;
use crate::error::{UpstreamError, UpstreamResult};
use crate::protocol::message::{MessageKind, StampId};
use crate::utils::current_timestamp;

use super::{
    MessageId, MessageStore, ModerationSource, SessionStore, StreamDirectory, StreamInfo,
    TenantContext, Timeout,
};

// ----------------------------------------------------------------------------
// [저장 레코드]
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub is_active:    bool,
    pub enable_chat:  bool,
    pub viewer_count: u64,
    pub peak_viewers: u64,
}

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id:         MessageId,
    pub tenant:     String,
    pub room:       String,
    pub author_id:  Option<String>,
    pub content:    String,
    pub kind:       MessageKind,
    pub created_at: u64,
    pub is_deleted: bool,
    pub is_pinned:  bool,
}

#[derive(Debug, Clone)]
pub struct StoredReaction {
    pub tenant:    String,
    pub stream_id: String,
    pub author_id: String,
    pub stamp_id:  StampId,
}

#[derive(Debug, Clone)]
struct BannedWord {
    word:      String,
    is_active: bool,
}

// ----------------------------------------------------------------------------
// [MemoryUpstream]
// ----------------------------------------------------------------------------

pub struct MemoryUpstream {
    sessions:     RwLock<HashMap<String, Identity>>,
    streams:      RwLock<HashMap<String, StreamRecord>>,
    banned_words: RwLock<Vec<BannedWord>>,
    timeouts:     RwLock<Vec<Timeout>>,
    messages:     RwLock<Vec<StoredMessage>>,
    reactions:    RwLock<Vec<StoredReaction>>,
    next_id:      AtomicU64,
    /// true면 모든 호출이 UpstreamError (장애 주입)
    unavailable:  AtomicBool,
}

impl Default for MemoryUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryUpstream {
    pub fn new() -> Self {
        trace!("Initializing MemoryUpstream");
        Self {
            sessions:     RwLock::new(HashMap::new()),
            streams:      RwLock::new(HashMap::new()),
            banned_words: RwLock::new(Vec::new()),
            timeouts:     RwLock::new(Vec::new()),
            messages:     RwLock::new(Vec::new()),
            reactions:    RwLock::new(Vec::new()),
            next_id:      AtomicU64::new(1),
            unavailable:  AtomicBool::new(false),
        }
    }

    pub fn from_seed(seed: SeedData) -> Self {
        let mem = Self::new();
        let now = current_timestamp();
        for s in seed.sessions {
            mem.add_session(&s.token, Identity::authenticated(s.id, s.display_name));
        }
        for s in seed.streams {
            mem.add_stream(&s.stream_id, s.is_active, s.enable_chat);
        }
        for w in seed.banned_words {
            mem.add_banned_word(&w);
        }
        for t in seed.timeouts {
            mem.add_timeout(Timeout {
                target_id:  t.target_id,
                issued_by:  t.issued_by,
                expires_at: now + t.expires_in_secs * 1000,
                is_active:  true,
            });
        }
        mem
    }

    // --- 시드/조작 ---

    pub fn add_session(&self, token: &str, identity: Identity) {
        self.sessions.write().unwrap().insert(token.to_string(), identity);
    }

    pub fn add_stream(&self, stream_id: &str, is_active: bool, enable_chat: bool) {
        self.streams.write().unwrap().insert(stream_id.to_string(), StreamRecord {
            is_active,
            enable_chat,
            viewer_count: 0,
            peak_viewers: 0,
        });
    }

    pub fn add_banned_word(&self, word: &str) {
        self.banned_words.write().unwrap().push(BannedWord {
            word:      word.to_string(),
            is_active: true,
        });
    }

    pub fn deactivate_banned_word(&self, word: &str) {
        for w in self.banned_words.write().unwrap().iter_mut() {
            if w.word == word {
                w.is_active = false;
            }
        }
    }

    pub fn add_timeout(&self, timeout: Timeout) {
        self.timeouts.write().unwrap().push(timeout);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    // --- 조회 ---

    pub fn stream(&self, stream_id: &str) -> Option<StreamRecord> {
        self.streams.read().unwrap().get(stream_id).cloned()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.messages.read().unwrap().clone()
    }

    pub fn reactions(&self) -> Vec<StoredReaction> {
        self.reactions.read().unwrap().clone()
    }

    fn check_available(&self) -> UpstreamResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(UpstreamError("memory upstream marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryUpstream {
    async fn get_user_by_session_token(
        &self,
        _tenant: &TenantContext,
        token:   &str,
    ) -> UpstreamResult<Option<Identity>> {
        self.check_available()?;
        Ok(self.sessions.read().unwrap().get(token).cloned())
    }
}

#[async_trait]
impl StreamDirectory for MemoryUpstream {
    async fn get_stream(&self, _tenant: &TenantContext, stream_id: &str) -> UpstreamResult<StreamInfo> {
        self.check_available()?;
        Ok(match self.streams.read().unwrap().get(stream_id) {
            Some(s) => StreamInfo { exists: true, is_active: s.is_active, enable_chat: s.enable_chat },
            None    => StreamInfo::missing(),
        })
    }

    async fn update_viewer_count(
        &self,
        _tenant:   &TenantContext,
        stream_id: &str,
        count:     u64,
        peak:      u64,
    ) -> UpstreamResult<()> {
        self.check_available()?;
        if let Some(s) = self.streams.write().unwrap().get_mut(stream_id) {
            s.viewer_count = count;
            s.peak_viewers = s.peak_viewers.max(peak);
        }
        Ok(())
    }
}

#[async_trait]
impl ModerationSource for MemoryUpstream {
    async fn list_active_banned_words(&self, _tenant: &TenantContext) -> UpstreamResult<HashSet<String>> {
        self.check_available()?;
        Ok(self.banned_words.read().unwrap()
            .iter()
            .filter(|w| w.is_active)
            .map(|w| w.word.clone())
            .collect())
    }

    async fn list_active_timeouts(&self, _tenant: &TenantContext) -> UpstreamResult<Vec<Timeout>> {
        self.check_available()?;
        Ok(self.timeouts.read().unwrap()
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MessageStore for MemoryUpstream {
    async fn append_message(
        &self,
        tenant:  &TenantContext,
        room:    &str,
        author:  Option<&Identity>,
        content: &str,
        kind:    MessageKind,
    ) -> UpstreamResult<MessageId> {
        self.check_available()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.messages.write().unwrap().push(StoredMessage {
            id,
            tenant:     tenant.schema().to_string(),
            room:       room.to_string(),
            author_id:  author.map(|a| a.id.clone()),
            content:    content.to_string(),
            kind,
            created_at: current_timestamp(),
            is_deleted: false,
            is_pinned:  false,
        });
        Ok(id)
    }

    async fn record_reaction(
        &self,
        tenant:    &TenantContext,
        stream_id: &str,
        author:    &Identity,
        stamp_id:  &StampId,
    ) -> UpstreamResult<()> {
        self.check_available()?;
        if !self.streams.read().unwrap().contains_key(stream_id) {
            return Err(UpstreamError(format!("stream not found: {}", stream_id)));
        }
        self.reactions.write().unwrap().push(StoredReaction {
            tenant:    tenant.schema().to_string(),
            stream_id: stream_id.to_string(),
            author_id: author.id.clone(),
            stamp_id:  stamp_id.clone(),
        });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// [SeedData] --seed JSON 파일 구조
// ----------------------------------------------------------------------------
//
// {
//   "sessions":     [{ "token": "tok-alice", "id": "1", "display_name": "alice" }],
//   "streams":      [{ "stream_id": "42" }],
//   "banned_words": ["spam"],
//   "timeouts":     [{ "target_id": "3", "issued_by": "1", "expires_in_secs": 600 }]
// }

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub sessions:     Vec<SeedSession>,
    pub streams:      Vec<SeedStream>,
    pub banned_words: Vec<String>,
    pub timeouts:     Vec<SeedTimeout>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSession {
    pub token:        String,
    pub id:           String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SeedStream {
    pub stream_id:   String,
    #[serde(default = "default_true")]
    pub is_active:   bool,
    #[serde(default = "default_true")]
    pub enable_chat: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeedTimeout {
    pub target_id:       String,
    pub issued_by:       String,
    pub expires_in_secs: u64,
}

fn default_true() -> bool {
    true
}

impl SeedData {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
