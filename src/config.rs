// 매직 넘버를 배제하고 채팅 팬아웃 계층의 한계와 주기를 제어하는 상수 모음입니다.

/// 웹소켓 채팅 서버 TCP 포트
pub const CHAT_PORT: u16 = 8080;

/// 테넌트 스키마 미지정 시 기본값
pub const DEFAULT_TENANT: &str = "public";

/// 세션 토큰을 담는 쿠키 이름
pub const SESSION_COOKIE: &str = "sessionid";

// ----------------------------------------------------------------------------
// 메시지 필터
// ----------------------------------------------------------------------------

/// 채팅 메시지 최대 길이 (문자 수)
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// 반복 문자 스팸 판정: 서로 다른 문자가 이 값 미만이면 의심
pub const SPAM_MIN_DISTINCT_CHARS: usize = 3;

/// 반복 문자 스팸 판정: 길이가 이 값을 초과할 때만 적용
pub const SPAM_MIN_LENGTH: usize = 10;

// ----------------------------------------------------------------------------
// 룸 / 브로드캐스트 버스
// ----------------------------------------------------------------------------

/// 스트림 바인딩 룸 이름 접두사 (예: "stream_42")
pub const STREAM_ROOM_PREFIX: &str = "stream_";

/// 룸 토픽별 브로드캐스트 버퍼 크기.
/// 느린 구독자가 이 이상 밀리면 오래된 이벤트부터 건너뜁니다(Lagged).
pub const ROOM_BUS_CAPACITY: usize = 1024;

/// 커넥션별 송신(Egress) 큐 사이즈
pub const EGRESS_QUEUE_SIZE: usize = 256;

// ----------------------------------------------------------------------------
// 백그라운드 태스크
// ----------------------------------------------------------------------------

/// 영속화 워커 수 (기본값, --persist-workers 로 오버라이드)
pub const PERSIST_WORKERS: usize = 4;

/// 영속화 작업 큐 사이즈
pub const PERSIST_QUEUE_SIZE: usize = 4096;

/// 금칙어/타임아웃 스냅샷 갱신 주기 (5초)
pub const MODERATION_REFRESH_INTERVAL_MS: u64 = 5_000;

/// 시청자 수 재조정 주기 (10초)
pub const PRESENCE_RECONCILE_INTERVAL_MS: u64 = 10_000;

/// SSE keep-alive 주기 (15초)
pub const TRACE_KEEPALIVE_SECS: u64 = 15;
