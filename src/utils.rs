use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch 기준 밀리초. 시계가 epoch 이전이면 0
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// 송신 프레임용 RFC3339 시각 문자열
pub fn rfc3339_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
