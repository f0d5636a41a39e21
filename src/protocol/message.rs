use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::core::{BusEvent, Identity};
use crate::error::{ChatError, ChatResult};
use crate::utils::rfc3339_now;

/// 시스템 메시지 발신자 표시 이름
pub const SYSTEM_USERNAME: &str = "system";

// ----------------------------------------------------------------------------
// [공통] 메시지 종류 / 스탬프 ID
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Message,
    Join,
    Leave,
    System,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::Join    => "join",
            MessageKind::Leave   => "leave",
            MessageKind::System  => "system",
        }
    }
}

/// 클라이언트가 숫자 또는 문자열로 보냄. 받은 형태 그대로 되돌려줌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StampId {
    Num(i64),
    Text(String),
}

impl fmt::Display for StampId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StampId::Num(n)  => write!(f, "{}", n),
            StampId::Text(s) => write!(f, "{}", s),
        }
    }
}

// ----------------------------------------------------------------------------
// [C→S] 수신 프레임
//   { "message": "..." }                                              → 채팅
//   { "type": "reaction", "stamp_id", "stamp_name", "stamp_image_url" } → 리액션
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub enum InboundFrame {
    Chat { message: String },
    Reaction(ReactionPayload),
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReactionPayload {
    pub stamp_id:        StampId,
    #[serde(default)]
    pub stamp_name:      Option<String>,
    #[serde(default)]
    pub stamp_image_url: Option<String>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> ChatResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ChatError::MalformedFrame(e.to_string()))?;

        // reaction 외의 type 은 무시하고 message 로 판단
        if value.get("type").and_then(Value::as_str) == Some("reaction") {
            return serde_json::from_value(value)
                .map(InboundFrame::Reaction)
                .map_err(|e| ChatError::MalformedFrame(e.to_string()));
        }

        match value.get("message").and_then(Value::as_str) {
            Some(message) => Ok(InboundFrame::Chat { message: message.to_string() }),
            None          => Err(ChatError::MalformedFrame("missing message".to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// [S→C] 송신 프레임
// ----------------------------------------------------------------------------

/// { message, username, user_id, message_type, timestamp }
#[derive(Serialize, Debug, Clone)]
pub struct ChatFrame {
    pub message:      String,
    pub username:     String,
    pub user_id:      Option<String>,
    pub message_type: MessageKind,
    pub timestamp:    String,
}

impl ChatFrame {
    pub fn message(author: &Identity, content: String) -> Self {
        Self {
            message:      content,
            username:     author.display_name.clone(),
            user_id:      Some(author.id.clone()),
            message_type: MessageKind::Message,
            timestamp:    rfc3339_now(),
        }
    }

    pub fn join(who: &Identity) -> Self {
        Self::from_system(format!("{} joined the chat", who.display_name), MessageKind::Join)
    }

    pub fn leave(who: &Identity) -> Self {
        Self::from_system(format!("{} left the chat", who.display_name), MessageKind::Leave)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::from_system(text.into(), MessageKind::System)
    }

    fn from_system(text: String, kind: MessageKind) -> Self {
        Self {
            message:      text,
            username:     SYSTEM_USERNAME.to_string(),
            user_id:      None,
            message_type: kind,
            timestamp:    rfc3339_now(),
        }
    }
}

/// { type: "reaction", stamp_id, stamp_name, stamp_image_url, username, user_id }
#[derive(Serialize, Debug, Clone)]
pub struct ReactionFrame {
    pub stamp_id:        StampId,
    pub stamp_name:      Option<String>,
    pub stamp_image_url: Option<String>,
    pub username:        String,
    pub user_id:         String,
}

impl ReactionFrame {
    pub fn new(author: &Identity, payload: ReactionPayload) -> Self {
        Self {
            stamp_id:        payload.stamp_id,
            stamp_name:      payload.stamp_name,
            stamp_image_url: payload.stamp_image_url,
            username:        author.display_name.clone(),
            user_id:         author.id.clone(),
        }
    }
}

/// { error, message_type? } 발신자에게만 유니캐스트
#[derive(Serialize, Debug, Clone)]
pub struct ErrorFrame {
    pub error:        String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_type: Option<&'static str>,
}

/// "type" 태그가 붙는 송신 프레임
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypedFrame<'a> {
    Reaction(&'a ReactionFrame),
    ViewerCount { count: u64 },
}

// ----------------------------------------------------------------------------
// [직렬화 경계] BusEvent → 전송 프레임 JSON
// ----------------------------------------------------------------------------

pub fn encode_event(event: &BusEvent) -> String {
    match event {
        BusEvent::Chat(frame)          => to_json(frame),
        BusEvent::Reaction(frame)      => to_json(&TypedFrame::Reaction(frame)),
        BusEvent::ViewerCount { count } => to_json(&TypedFrame::ViewerCount { count: *count }),
    }
}

pub fn encode_error(frame: &ErrorFrame) -> String {
    to_json(frame)
}

fn to_json(payload: &impl Serialize) -> String {
    serde_json::to_string(payload).unwrap_or_default()
}
