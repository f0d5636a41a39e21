pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod persist;
pub mod protocol;
pub mod sweeper;
pub mod trace;
pub mod upstream;
pub mod utils;

use axum::{routing::{get, post}, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::http::HttpState;
use crate::protocol::{chat_ws_handler, viewers_ws_handler, AppState};
use crate::upstream::{TenantContext, Upstream};

/// CLI에서 주입되는 런타임 설정. 기본값은 config.rs 상수
pub struct ServerArgs {
    pub port:            u16,
    pub tenant:          String,
    pub persist_workers: usize,
}

impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            port:            config::CHAT_PORT,
            tenant:          config::DEFAULT_TENANT.to_string(),
            persist_workers: config::PERSIST_WORKERS,
        }
    }
}

/// WS + REST + SSE 라우터 구성
pub fn build_router(app_state: AppState) -> Router {
    let http_state = HttpState::from_app(&app_state);

    let admin_router = Router::new()
        .route("/admin/status",                   get(http::admin_status))
        .route("/admin/rooms",                    get(http::admin_list_rooms))
        .route("/admin/rooms/{room}",             get(http::admin_get_room))
        .route("/admin/rooms/{room}/deactivate",  post(http::admin_deactivate_room))
        .route("/admin/rooms/{room}/activate",    post(http::admin_activate_room))
        .route("/rooms/{room}",                   get(http::get_room_snapshot))
        .route("/trace",                          get(http::trace_stream))
        .route("/trace/{room}",                   get(http::trace_stream))
        .with_state(http_state);

    // CORS 전체 허용 (대시보드, 스트림 페이지 로컬 접속)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/chat/{room}",         get(chat_ws_handler))
        .route("/ws/viewers/{stream_id}", get(viewers_ws_handler))
        .with_state(app_state)
        .merge(admin_router)
        .layer(cors)
}

pub async fn run_server(args: ServerArgs, upstream: Upstream) -> std::io::Result<()> {
    let tenant    = TenantContext::new(args.tenant);
    let app_state = AppState::new(tenant.clone(), upstream, args.persist_workers);

    // 금칙어/타임아웃 스냅샷 최초 로드. 실패해도 빈 스냅샷으로 기동
    if let Err(e) = app_state.moderation.refresh(&tenant).await {
        warn!("[moderation] initial load failed: {}", e);
    }

    tokio::spawn(sweeper::run_moderation_refresh(
        Arc::clone(&app_state.moderation),
        tenant.clone(),
    ));

    tokio::spawn(sweeper::run_presence_reconciler(
        Arc::clone(&app_state.registry),
        Arc::clone(&app_state.presence),
        Arc::clone(&app_state.upstream.streams),
        Arc::clone(&app_state.trace_hub),
        tenant.clone(),
    ));

    let app = build_router(app_state);

    let addr     = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;

    info!("[stream-chat] Chat server on ws://{}/ws/chat/{{room}}", addr);
    info!("[stream-chat] Tenant: {}", tenant);

    axum::serve(listener, app).await
}
