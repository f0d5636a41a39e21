// 외부 협력자 인터페이스
//
// 이 계층은 세션 저장소 / 스트림 DB / 모더레이션 테이블 / 메시지 저장소를
// 소유하지 않습니다. 모든 호출은 이미 결정된 테넌트 컨텍스트를 첫 인자로 받습니다.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::core::Identity;
use crate::error::UpstreamResult;
use crate::protocol::message::{MessageKind, StampId};

pub use memory::{MemoryUpstream, SeedData};

// ----------------------------------------------------------------------------
// [공통 타입]
// ----------------------------------------------------------------------------

/// 테넌트 스키마 컨텍스트: 외부 미들웨어가 결정, 여기서는 불투명 값
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantContext(String);

impl TenantContext {
    pub fn new(schema: impl Into<String>) -> Self {
        Self(schema.into())
    }

    pub fn schema(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type MessageId = u64;

/// get_stream 응답
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub exists:      bool,
    pub is_active:   bool,
    pub enable_chat: bool,
}

impl StreamInfo {
    pub fn missing() -> Self {
        Self { exists: false, is_active: false, enable_chat: false }
    }
}

/// 특정 사용자의 채팅 일시 정지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    pub target_id:  String,
    pub issued_by:  String,
    /// Unix millis
    pub expires_at: u64,
    pub is_active:  bool,
}

impl Timeout {
    pub fn is_in_effect(&self, now_ms: u64) -> bool {
        self.is_active && self.expires_at > now_ms
    }
}

// ----------------------------------------------------------------------------
// [협력자 trait]
// ----------------------------------------------------------------------------

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_user_by_session_token(
        &self,
        tenant: &TenantContext,
        token:  &str,
    ) -> UpstreamResult<Option<Identity>>;
}

#[async_trait]
pub trait StreamDirectory: Send + Sync {
    async fn get_stream(&self, tenant: &TenantContext, stream_id: &str) -> UpstreamResult<StreamInfo>;

    /// 현재/최고 시청자 수 반영 (best-effort)
    async fn update_viewer_count(
        &self,
        tenant:    &TenantContext,
        stream_id: &str,
        count:     u64,
        peak:      u64,
    ) -> UpstreamResult<()>;
}

#[async_trait]
pub trait ModerationSource: Send + Sync {
    async fn list_active_banned_words(&self, tenant: &TenantContext) -> UpstreamResult<HashSet<String>>;

    async fn list_active_timeouts(&self, tenant: &TenantContext) -> UpstreamResult<Vec<Timeout>>;

    async fn is_timed_out(
        &self,
        tenant:   &TenantContext,
        identity: &Identity,
        now_ms:   u64,
    ) -> UpstreamResult<bool> {
        let timeouts = self.list_active_timeouts(tenant).await?;
        Ok(timeouts.iter().any(|t| t.target_id == identity.id && t.is_in_effect(now_ms)))
    }
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append_message(
        &self,
        tenant:  &TenantContext,
        room:    &str,
        author:  Option<&Identity>,
        content: &str,
        kind:    MessageKind,
    ) -> UpstreamResult<MessageId>;

    async fn record_reaction(
        &self,
        tenant:    &TenantContext,
        stream_id: &str,
        author:    &Identity,
        stamp_id:  &StampId,
    ) -> UpstreamResult<()>;
}

// ----------------------------------------------------------------------------
// [Upstream] 협력자 묶음: AppState에 보관
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct Upstream {
    pub sessions:   Arc<dyn SessionStore>,
    pub streams:    Arc<dyn StreamDirectory>,
    pub moderation: Arc<dyn ModerationSource>,
    pub messages:   Arc<dyn MessageStore>,
}

impl Upstream {
    /// 하나의 인메모리 구현으로 네 협력자를 모두 채움
    pub fn from_memory(mem: Arc<MemoryUpstream>) -> Self {
        Self {
            sessions:   mem.clone(),
            streams:    mem.clone(),
            moderation: mem.clone(),
            messages:   mem,
        }
    }
}
