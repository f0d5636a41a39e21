// SessionResolver: 핸드셰이크 시점 1회 세션 토큰 → Identity 해석

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::config;
use crate::upstream::{SessionStore, TenantContext};

// ----------------------------------------------------------------------------
// [Identity] 커넥션 수명 동안 불변
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id:               String,
    pub display_name:     String,
    pub is_authenticated: bool,
}

impl Identity {
    pub fn authenticated(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self { id: id.into(), display_name: display_name.into(), is_authenticated: true }
    }

    pub fn anonymous() -> Self {
        Self { id: String::new(), display_name: "anonymous".to_string(), is_authenticated: false }
    }
}

// ----------------------------------------------------------------------------
// [HandshakeContext] 전송 계층 핸드셰이크에서 추출한 세션 토큰
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct HandshakeContext {
    pub session_token: Option<String>,
}

impl HandshakeContext {
    /// 토큰 우선순위: 세션 쿠키 → Authorization: Bearer → ?token= 쿼리
    pub fn from_parts(headers: &HeaderMap, query: &HashMap<String, String>) -> Self {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == config::SESSION_COOKIE)
            .map(|(_, value)| value.to_string());

        let from_bearer = || {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
        };

        let session_token = from_cookie
            .or_else(from_bearer)
            .or_else(|| query.get("token").cloned())
            .filter(|t| !t.is_empty());

        Self { session_token }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self { session_token: Some(token.into()) }
    }
}

// ----------------------------------------------------------------------------
// [SessionResolver]
// ----------------------------------------------------------------------------

pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// 항상 성공. 토큰 없음/만료/조회 실패는 모두 Anonymous로 강등 (읽기 전용 시청 허용)
    pub async fn resolve(&self, tenant: &TenantContext, ctx: &HandshakeContext) -> Identity {
        let token = match &ctx.session_token {
            Some(t) => t,
            None    => {
                trace!("[identity] no session token, anonymous");
                return Identity::anonymous();
            }
        };

        match self.store.get_user_by_session_token(tenant, token).await {
            Ok(Some(identity)) => {
                trace!("[identity] resolved user={} tenant={}", identity.id, tenant);
                identity
            }
            Ok(None) => {
                trace!("[identity] unknown or expired token, anonymous");
                Identity::anonymous()
            }
            Err(e) => {
                warn!("[identity] session lookup failed, degrading to anonymous: {}", e);
                Identity::anonymous()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MemoryUpstream;
    use axum::http::HeaderValue;

    fn resolver(mem: &Arc<MemoryUpstream>) -> SessionResolver {
        SessionResolver::new(mem.clone())
    }

    #[test]
    fn token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("csrftoken=x; sessionid=abc; theme=dark"));
        let ctx = HandshakeContext::from_parts(&headers, &HashMap::new());
        assert_eq!(ctx.session_token.as_deref(), Some("abc"));
    }

    #[test]
    fn token_from_bearer_then_query() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        let mut query = HashMap::new();
        query.insert("token".to_string(), "q".to_string());
        assert_eq!(HandshakeContext::from_parts(&headers, &query).session_token.as_deref(), Some("xyz"));
        assert_eq!(HandshakeContext::from_parts(&HeaderMap::new(), &query).session_token.as_deref(), Some("q"));
    }

    #[test]
    fn empty_token_is_none() {
        let mut query = HashMap::new();
        query.insert("token".to_string(), String::new());
        assert!(HandshakeContext::from_parts(&HeaderMap::new(), &query).session_token.is_none());
    }

    #[tokio::test]
    async fn resolve_known_token() {
        let mem = Arc::new(MemoryUpstream::new());
        mem.add_session("tok", Identity::authenticated("1", "alice"));
        let id = resolver(&mem).resolve(&TenantContext::new("t"), &HandshakeContext::with_token("tok")).await;
        assert!(id.is_authenticated);
        assert_eq!(id.display_name, "alice");
    }

    #[tokio::test]
    async fn resolve_degrades_to_anonymous() {
        let mem = Arc::new(MemoryUpstream::new());
        let tenant = TenantContext::new("t");

        let id = resolver(&mem).resolve(&tenant, &HandshakeContext::default()).await;
        assert!(!id.is_authenticated);

        let id = resolver(&mem).resolve(&tenant, &HandshakeContext::with_token("missing")).await;
        assert!(!id.is_authenticated);

        mem.add_session("tok", Identity::authenticated("1", "alice"));
        mem.set_unavailable(true);
        let id = resolver(&mem).resolve(&tenant, &HandshakeContext::with_token("tok")).await;
        assert_eq!(id, Identity::anonymous());
    }
}
