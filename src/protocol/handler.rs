// 채팅 / 시청자 수 WebSocket 핸들러
//
// 커넥션 하나 = 태스크 하나
//   [writer]    egress mpsc → WS 송신
//   [main loop] select! { WS 수신 → 필터 → 영속화 큐 → 버스 publish
//                         버스 구독 → egress }
//
// 같은 프로세스 구독자라도 반드시 버스를 거쳐 전달. 발신자 본인도 버스로 받음

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitStream, StreamExt},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config;
use crate::core::{
    accept, BroadcastBus, BusEvent, HandshakeContext, Identity, ModerationCache, PresenceTracker,
    Room, RoomRegistry, SessionResolver, Subscription, Topic,
};
use crate::error::{ChatError, ChatResult};
use crate::persist::{PersistJob, PersistPool};
use crate::protocol::{
    error_code::{to_error_frame, to_join_error_frame},
    message::{
        encode_error, encode_event, ChatFrame, InboundFrame, MessageKind, ReactionFrame, ReactionPayload,
    },
    session::{ConnSession, ConnState},
};
use crate::trace::{TraceDir, TraceEvent, TraceHub};
use crate::upstream::{TenantContext, Upstream};
use crate::utils::current_timestamp;

// ----------------------------------------------------------------------------
// [공유 상태]
// ----------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub tenant:      TenantContext,
    pub upstream:    Upstream,
    pub resolver:    Arc<SessionResolver>,
    pub registry:    Arc<RoomRegistry>,
    pub bus:         Arc<BroadcastBus>,
    pub moderation:  Arc<ModerationCache>,
    pub presence:    Arc<PresenceTracker>,
    pub persist:     Arc<PersistPool>,
    pub trace_hub:   Arc<TraceHub>,
    /// 현재 열린 채팅 커넥션 수
    pub connections: Arc<AtomicUsize>,
    conn_seq:        Arc<AtomicU64>,
}

impl AppState {
    /// 허브와 영속화 워커를 구성. tokio 런타임 안에서 호출해야 함
    pub fn new(tenant: TenantContext, upstream: Upstream, persist_workers: usize) -> Self {
        let bus = Arc::new(BroadcastBus::new(config::ROOM_BUS_CAPACITY));
        Self {
            tenant,
            resolver:    Arc::new(SessionResolver::new(Arc::clone(&upstream.sessions))),
            registry:    Arc::new(RoomRegistry::new(Arc::clone(&upstream.streams))),
            moderation:  Arc::new(ModerationCache::new(Arc::clone(&upstream.moderation))),
            presence:    Arc::new(PresenceTracker::new(Arc::clone(&bus))),
            persist:     PersistPool::spawn(
                Arc::clone(&upstream.messages),
                persist_workers,
                config::PERSIST_QUEUE_SIZE,
            ),
            trace_hub:   TraceHub::new(),
            connections: Arc::new(AtomicUsize::new(0)),
            conn_seq:    Arc::new(AtomicU64::new(1)),
            upstream,
            bus,
        }
    }

    fn next_conn_id(&self) -> u64 {
        self.conn_seq.fetch_add(1, Ordering::Relaxed)
    }
}

// ----------------------------------------------------------------------------
// [WS 진입점]
// ----------------------------------------------------------------------------

/// GET /ws/chat/{room}
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let ctx = HandshakeContext::from_parts(&headers, &query);
    ws.on_upgrade(move |socket| handle_socket(socket, state, room, ctx))
}

/// GET /ws/viewers/{stream_id}
pub async fn viewers_ws_handler(
    ws: WebSocketUpgrade,
    Path(stream_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_viewer_socket(socket, state, stream_id))
}

// ----------------------------------------------------------------------------
// [커넥션]
// ----------------------------------------------------------------------------

struct Connection {
    state:     AppState,
    session:   ConnSession,
    identity:  Identity,
    room_name: String,
    tx:        mpsc::Sender<Message>,
}

async fn handle_socket(socket: WebSocket, state: AppState, room_name: String, ctx: HandshakeContext) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(config::EGRESS_QUEUE_SIZE);

    // [writer] egress → WS 송신. Close 프레임을 보내면 종료
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_tx.send(msg).await.is_err() || closing {
                break;
            }
        }
    });

    state.connections.fetch_add(1, Ordering::Relaxed);
    let mut conn = Connection {
        session:   ConnSession::new(state.next_conn_id()),
        identity:  Identity::anonymous(),
        state:     state.clone(),
        room_name,
        tx,
    };

    let final_state = match conn.open(&ctx).await {
        Ok(room) => {
            match conn.activate(&room) {
                Ok(sub) => {
                    let sub = conn.run(&room, &mut ws_rx, sub).await;
                    conn.close(&room, sub);
                }
                Err(e) => error!("[conn] conn={} activation failed: {}", conn.conn_id(), e),
            }
            writer.abort();
            conn.session.state()
        }
        Err(e) => {
            conn.reject(e).await;
            let state = conn.session.state();
            drop(conn);
            let _ = writer.await;
            state
        }
    };

    if !final_state.is_terminal() {
        warn!("[conn] connection task ended in non-terminal state {}", final_state);
    }

    state.connections.fetch_sub(1, Ordering::Relaxed);
}

impl Connection {
    fn conn_id(&self) -> u64 {
        self.session.conn_id
    }

    fn topic(&self) -> Topic {
        Topic::Room(self.room_name.clone())
    }

    fn trace(&self, dir: TraceDir, kind: &str, summary: impl Into<String>) {
        self.state.trace_hub.publish(TraceEvent::new(
            dir,
            Some(self.room_name.as_str()),
            Some(self.identity.id.as_str()),
            kind,
            summary,
        ));
    }

    async fn send(&self, json: String) -> ChatResult<()> {
        self.tx
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| ChatError::TransportError("egress queue closed".to_string()))
    }

    /// 발신자 전용 에러 프레임
    async fn send_error(&self, err: &ChatError) -> ChatResult<()> {
        self.send(encode_error(&to_error_frame(err))).await
    }

    // --- Connecting → Authenticating → Joining ---

    async fn open(&mut self, ctx: &HandshakeContext) -> ChatResult<Arc<Room>> {
        self.session.transition(ConnState::Authenticating)?;

        self.identity = self.state.resolver.resolve(&self.state.tenant, ctx).await;
        self.session.transition(ConnState::Joining)?;

        self.state.registry.join(&self.state.tenant, &self.room_name).await
    }

    /// Joining 실패 → Rejected. 에러 프레임 후 전송 계층 종료
    async fn reject(&mut self, err: ChatError) {
        if let Err(e) = self.session.transition(ConnState::Rejected) {
            error!("[conn] conn={} {}", self.conn_id(), e);
        }
        warn!("[conn] conn={} room={} rejected: {}", self.conn_id(), self.room_name, err);
        self.trace(TraceDir::Out, "rejected", err.to_string());

        let _ = self.send(encode_error(&to_join_error_frame(&err))).await;
        let _ = self.tx.send(Message::Close(Some(CloseFrame {
            code:   close_code::POLICY,
            reason: "join rejected".into(),
        }))).await;
    }

    // --- Joining → Active ---

    /// 구독을 먼저 걸고 멤버 등록. 입장 이벤트는 본인도 버스로 받음
    fn activate(&mut self, room: &Room) -> ChatResult<Subscription> {
        self.session.transition(ConnState::Active)?;

        let sub = self.state.bus.subscribe(&self.topic());
        let presence = &self.state.presence;
        room.add_member_with(self.conn_id(), |members| {
            if let Some(stream_id) = &room.stream_id {
                presence.joined(stream_id, members);
            }
        });

        if self.identity.is_authenticated {
            self.state.bus.publish(&self.topic(), BusEvent::Chat(ChatFrame::join(&self.identity)));
        }

        info!(
            "[conn] conn={} room={} active (user={}, authenticated={})",
            self.conn_id(), self.room_name, self.identity.display_name, self.identity.is_authenticated,
        );
        self.trace(TraceDir::In, "join", self.identity.display_name.clone());
        Ok(sub)
    }

    // --- Active ---

    async fn run(
        &mut self,
        room:  &Room,
        ws_rx: &mut SplitStream<WebSocket>,
        mut sub: Subscription,
    ) -> Subscription {
        loop {
            tokio::select! {
                incoming = ws_rx.next() => {
                    let result = match incoming {
                        Some(Ok(Message::Text(text)))  => self.on_frame(room, text.as_str()).await,
                        Some(Ok(Message::Binary(_)))   => Err(ChatError::MalformedFrame("binary frame".to_string())),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue, // ping / pong
                        Some(Err(e)) => {
                            warn!("[conn] conn={} transport error: {}", self.conn_id(), e);
                            break;
                        }
                    };

                    if let Err(e) = result {
                        if matches!(e, ChatError::TransportError(_)) {
                            break;
                        }
                        debug!("[conn] conn={} frame rejected: {}", self.conn_id(), e);
                        self.trace(TraceDir::Out, "rejected", e.to_string());
                        if self.send_error(&e).await.is_err() {
                            break;
                        }
                    }
                }
                event = sub.recv() => {
                    let Some(event) = event else { break };
                    if self.send(encode_event(&event)).await.is_err() {
                        break;
                    }
                }
            }
        }
        sub
    }

    async fn on_frame(&mut self, room: &Room, text: &str) -> ChatResult<()> {
        self.session.ensure_active()?;
        match InboundFrame::parse(text)? {
            InboundFrame::Chat { message }  => self.on_chat(room, &message).await,
            InboundFrame::Reaction(payload) => self.on_reaction(room, payload),
        }
    }

    /// 필터 → 영속화 큐 → publish
    async fn on_chat(&mut self, room: &Room, raw: &str) -> ChatResult<()> {
        let snapshot = self.state.moderation.load();
        let content = accept(&self.identity, raw, &snapshot, current_timestamp())?;

        let job = PersistJob::AppendMessage {
            tenant:  self.state.tenant.clone(),
            room:    room.name.clone(),
            author:  Some(self.identity.clone()),
            content: content.clone(),
            kind:    MessageKind::Message,
        };
        if let Err(e) = self.state.persist.enqueue_message(job).await {
            error!("[conn] conn={} message not persisted: {}", self.conn_id(), e);
        }

        self.trace(TraceDir::In, "message", content.clone());
        self.state.bus.publish(&self.topic(), BusEvent::Chat(ChatFrame::message(&self.identity, content)));
        self.session.transition(ConnState::Active)
    }

    /// 브로드캐스트 후 스트림 룸이면 best-effort 기록
    fn on_reaction(&mut self, room: &Room, payload: ReactionPayload) -> ChatResult<()> {
        if !self.identity.is_authenticated {
            return Err(ChatError::AuthRequired);
        }

        let frame = ReactionFrame::new(&self.identity, payload);
        let stamp_id = frame.stamp_id.clone();
        self.trace(TraceDir::In, "reaction", stamp_id.to_string());
        self.state.bus.publish(&self.topic(), BusEvent::Reaction(frame));

        if let Some(stream_id) = &room.stream_id {
            self.state.persist.try_enqueue_reaction(PersistJob::RecordReaction {
                tenant:    self.state.tenant.clone(),
                stream_id: stream_id.clone(),
                author:    self.identity.clone(),
                stamp_id,
            });
        }
        self.session.transition(ConnState::Active)
    }

    // --- Active → Closing → Closed ---

    fn close(&mut self, room: &Arc<Room>, sub: Subscription) {
        if let Err(e) = self.session.transition(ConnState::Closing) {
            error!("[conn] conn={} {}", self.conn_id(), e);
            return;
        }

        if self.identity.is_authenticated {
            self.state.bus.publish(&self.topic(), BusEvent::Chat(ChatFrame::leave(&self.identity)));
        }
        self.state.bus.unsubscribe(&self.topic(), sub);

        let presence = &self.state.presence;
        self.state.registry.leave(room, self.conn_id(), |members| {
            if let Some(stream_id) = &room.stream_id {
                presence.left(stream_id, members);
            }
        });

        if let Err(e) = self.session.transition(ConnState::Closed) {
            error!("[conn] conn={} {}", self.conn_id(), e);
        }
        info!("[conn] conn={} room={} closed", self.conn_id(), self.room_name);
        self.trace(TraceDir::Sys, "leave", self.identity.display_name.clone());
    }
}

// ----------------------------------------------------------------------------
// [시청자 수 전용 커넥션] 현재 값 즉시 1회 + 이후 변경분
// ----------------------------------------------------------------------------

async fn handle_viewer_socket(socket: WebSocket, state: AppState, stream_id: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let topic = Topic::Presence(stream_id.clone());
    let mut sub = state.bus.subscribe(&topic);

    let current = encode_event(&BusEvent::ViewerCount { count: state.presence.count(&stream_id) });
    if ws_tx.send(Message::Text(current.into())).await.is_ok() {
        loop {
            tokio::select! {
                incoming = ws_rx.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                },
                event = sub.recv() => {
                    let Some(event) = event else { break };
                    if ws_tx.send(Message::Text(encode_event(&event).into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    state.bus.unsubscribe(&topic, sub);
    debug!("[presence] viewer socket closed stream={}", stream_id);
}
