// 메시지 필터 & 모더레이션 게이트
//
// accept() 는 동기 / 인메모리. 외부 조회(금칙어, 타임아웃)는
// ModerationCache 가 백그라운드로 받아 둔 스냅샷만 읽습니다.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{info, trace};

use crate::config;
use crate::core::Identity;
use crate::error::{ChatError, ChatResult};
use crate::upstream::{ModerationSource, TenantContext, Timeout};
use crate::utils::current_timestamp;

// ----------------------------------------------------------------------------
// [파이프라인] 첫 거절에서 즉시 중단
//   1. 미인증           → AuthRequired
//   2. trim 후 길이     → InvalidLength
//   3. 공백 압축
//   4. 반복 문자 스팸   → Spam
//   5. 타임아웃         → Timeout
//   6. 금칙어           → BannedContent
// ----------------------------------------------------------------------------

/// 통과 시 3단계 정규화 문자열 반환 (저장/브로드캐스트 모두 이 값을 사용)
pub fn accept(
    identity: &Identity,
    raw:      &str,
    snapshot: &ModerationSnapshot,
    now_ms:   u64,
) -> ChatResult<String> {
    if !identity.is_authenticated {
        return Err(ChatError::AuthRequired);
    }

    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len == 0 || len > config::MAX_MESSAGE_LENGTH {
        return Err(ChatError::InvalidLength(len));
    }

    let normalized = collapse_whitespace(trimmed);

    if is_repeated_char_spam(&normalized) {
        return Err(ChatError::Spam);
    }

    if snapshot.is_timed_out(identity, now_ms) {
        return Err(ChatError::Timeout);
    }

    if let Some(word) = snapshot.find_banned(&normalized.to_lowercase()) {
        trace!("[moderation] banned word hit: {}", word);
        return Err(ChatError::BannedContent);
    }

    Ok(normalized)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 서로 다른 문자 3개 미만 + 길이 10 초과
fn is_repeated_char_spam(s: &str) -> bool {
    let distinct: HashSet<char> = s.to_lowercase().chars().collect();
    distinct.len() < config::SPAM_MIN_DISTINCT_CHARS && s.chars().count() > config::SPAM_MIN_LENGTH
}

// ----------------------------------------------------------------------------
// [ModerationSnapshot] 불변 스냅샷: 교체만 가능
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ModerationSnapshot {
    /// 소문자, 빈 문자열 제외
    banned_words: Vec<String>,
    /// target_id → 가장 늦은 만료 시각 (Unix millis)
    timeouts:     HashMap<String, u64>,
    pub loaded_at: u64,
}

impl ModerationSnapshot {
    pub fn new(banned_words: HashSet<String>, timeouts: Vec<Timeout>) -> Self {
        let mut words: Vec<String> = banned_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        words.sort();
        words.dedup();

        let mut by_target: HashMap<String, u64> = HashMap::new();
        for t in timeouts.into_iter().filter(|t| t.is_active) {
            let entry = by_target.entry(t.target_id).or_insert(0);
            *entry = (*entry).max(t.expires_at);
        }

        Self { banned_words: words, timeouts: by_target, loaded_at: current_timestamp() }
    }

    pub fn is_timed_out(&self, identity: &Identity, now_ms: u64) -> bool {
        self.timeouts
            .get(&identity.id)
            .is_some_and(|expires_at| *expires_at > now_ms)
    }

    /// lowered 는 이미 소문자여야 함. 첫 매치만 반환
    pub fn find_banned(&self, lowered: &str) -> Option<&str> {
        self.banned_words
            .iter()
            .find(|w| lowered.contains(w.as_str()))
            .map(String::as_str)
    }

    pub fn banned_word_count(&self) -> usize {
        self.banned_words.len()
    }

    pub fn timeout_count(&self) -> usize {
        self.timeouts.len()
    }
}

// ----------------------------------------------------------------------------
// [ModerationCache] copy-on-write 스냅샷 보관소
// ----------------------------------------------------------------------------

pub struct ModerationCache {
    snapshot: RwLock<Arc<ModerationSnapshot>>,
    source:   Arc<dyn ModerationSource>,
}

impl ModerationCache {
    pub fn new(source: Arc<dyn ModerationSource>) -> Self {
        trace!("Initializing ModerationCache");
        Self { snapshot: RwLock::new(Arc::new(ModerationSnapshot::default())), source }
    }

    /// 락은 Arc 복제 동안만 보유
    pub fn load(&self) -> Arc<ModerationSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    pub fn store(&self, snapshot: ModerationSnapshot) {
        *self.snapshot.write().unwrap() = Arc::new(snapshot);
    }

    /// 외부 조회는 락 밖에서 수행. 실패 시 기존 스냅샷 유지
    pub async fn refresh(&self, tenant: &TenantContext) -> ChatResult<()> {
        let words    = self.source.list_active_banned_words(tenant).await?;
        let timeouts = self.source.list_active_timeouts(tenant).await?;
        let snapshot = ModerationSnapshot::new(words, timeouts);
        info!(
            "[moderation] snapshot refreshed: {} banned word(s), {} timeout(s)",
            snapshot.banned_word_count(),
            snapshot.timeout_count(),
        );
        self.store(snapshot);
        Ok(())
    }
}
