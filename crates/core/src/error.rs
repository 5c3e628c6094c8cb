//! 에러 타입 -- 도메인별 에러 정의

/// intrusion-monitor 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 시계열 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// IP 위치 정보 조회 에러
    #[error("enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// 감시 루프 에러 (watchdog 크레이트에서 변환)
    #[error("watchdog error: {0}")]
    Watchdog(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 시계열 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 연결 불가 (ping 실패, 타임아웃)
    #[error("sink unreachable: {0}")]
    Unreachable(String),

    /// 레코드 기록 실패 (전송 에러)
    #[error("write failed: {0}")]
    Write(String),

    /// 2xx 이외의 HTTP 응답
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

/// IP 위치 정보 조회 에러
///
/// 코어는 이 에러를 "정보 없음"으로 취급하며 레코드 기록을 계속합니다.
#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    /// HTTP 전송 실패
    #[error("http request failed: {0}")]
    Http(String),

    /// 200 이외의 HTTP 응답
    #[error("unexpected status {0}")]
    Status(u16),

    /// JSON 디코딩 실패
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// API가 `status != "success"`를 반환
    #[error("api reported '{status}': {message}")]
    Api { status: String, message: String },
}
