use std::fmt;

use crate::protocol::session::ConnState;

#[derive(Debug)]
pub enum ChatError {
    // 연결/인증
    AuthRequired,
    NotReady,
    MalformedFrame(String),
    TransportError(String),
    InvalidTransition { from: ConnState, to: ConnState },

    // 룸
    RoomNotFound(String),
    RoomInactive(String),

    // 메시지 필터
    InvalidLength(usize),
    Spam,
    Timeout,
    BannedContent,

    // 외부 협력자
    UpstreamUnavailable(String),
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::AuthRequired             => write!(f, "Authentication required"),
            ChatError::NotReady                 => write!(f, "Connection is not ready"),
            ChatError::MalformedFrame(msg)      => write!(f, "Malformed frame: {}", msg),
            ChatError::TransportError(msg)      => write!(f, "Transport error: {}", msg),
            ChatError::InvalidTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            ChatError::RoomNotFound(room)       => write!(f, "Room not found: {}", room),
            ChatError::RoomInactive(room)       => write!(f, "Room is inactive: {}", room),
            ChatError::InvalidLength(len)       => write!(f, "Invalid message length: {}", len),
            ChatError::Spam                     => write!(f, "Message rejected as spam"),
            ChatError::Timeout                  => write!(f, "Sender is timed out"),
            ChatError::BannedContent            => write!(f, "Message contains banned content"),
            ChatError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

pub type ChatResult<T> = Result<T, ChatError>;

// ----------------------------------------------------------------------------
// [UpstreamError] 외부 협력자 호출 실패
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UpstreamError(pub String);

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UpstreamError {}

impl From<UpstreamError> for ChatError {
    fn from(err: UpstreamError) -> Self {
        ChatError::UpstreamUnavailable(err.0)
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;
