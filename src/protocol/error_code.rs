use crate::config;
use crate::error::ChatError;

use super::message::ErrorFrame;

/// 인증 실패 프레임 태그
pub const AUTH_ERROR: &str = "auth_error";

/// ChatError → 발신자 전용 에러 프레임 변환
/// 내부 사유(업스트림 메시지, 상태 전이 등)는 클라이언트에 노출하지 않음
pub fn to_error_frame(err: &ChatError) -> ErrorFrame {
    let error = match err {
        ChatError::AuthRequired             => "Login is required to chat".to_string(),
        ChatError::NotReady                 => "Connection is not ready yet".to_string(),
        ChatError::MalformedFrame(_)        => "Invalid message format".to_string(),
        ChatError::RoomNotFound(_)          => "Chat room not found".to_string(),
        ChatError::RoomInactive(_)          => "Chat is disabled for this room".to_string(),
        ChatError::InvalidLength(_)         => {
            format!("Message must be 1-{} characters", config::MAX_MESSAGE_LENGTH)
        }
        ChatError::Spam                     => "Message was rejected as spam".to_string(),
        ChatError::Timeout                  => "You are timed out and cannot chat right now".to_string(),
        ChatError::BannedContent            => "Message contains restricted content".to_string(),
        ChatError::UpstreamUnavailable(_)
        | ChatError::TransportError(_)
        | ChatError::InvalidTransition { .. } => "Failed to send message".to_string(),
    };

    let message_type = match err {
        ChatError::AuthRequired => Some(AUTH_ERROR),
        _                       => None,
    };

    ErrorFrame { error, message_type }
}

/// 입장 거절 프레임. 업스트림/내부 오류는 일시 장애 문구로 표시
pub fn to_join_error_frame(err: &ChatError) -> ErrorFrame {
    match err {
        ChatError::UpstreamUnavailable(_)
        | ChatError::TransportError(_)
        | ChatError::InvalidTransition { .. } => ErrorFrame {
            error:        "Chat is temporarily unavailable".to_string(),
            message_type: None,
        },
        _ => to_error_frame(err),
    }
}
