// Trace SSE 스트림 핸들러
//
// GET /trace       : 전체 이벤트 스트림
// GET /trace/{room}: 특정 룸만 필터

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Sse,
    },
};
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::config;

use super::state::HttpState;

pub async fn trace_stream(
    State(state): State<HttpState>,
    room_filter: Option<Path<String>>,
) -> impl IntoResponse {
    let rx     = state.trace_hub.subscribe();
    let filter = room_filter.map(|Path(room)| room);

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        // lagged 는 건너뜀
        let event = result.ok()?;
        let pass = match &filter {
            None       => true,
            Some(room) => event.room.as_deref() == Some(room.as_str()),
        };
        pass.then(|| {
            let json = serde_json::to_string(&event).unwrap_or_default();
            Ok::<Event, std::convert::Infallible>(Event::default().data(json))
        })
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(config::TRACE_KEEPALIVE_SECS))
            .text("keep-alive"),
    )
}
