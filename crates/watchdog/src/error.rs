//! 감시 루프 에러 타입
//!
//! 라인 단위 에러([`ParseError`], [`RecordError`])는 해당 라인만 버리고 계속 진행합니다.
//! [`WatchdogError`]는 감시 루프 자체를 멈추는 에러이며,
//! `From<WatchdogError> for MonitorError` 변환으로 상위 레이어에 전파됩니다.

use intrusion_monitor_core::error::{ConfigError, MonitorError, SinkError};

/// 라인 파싱 실패
///
/// 필드 단위 추출 실패(IP, 포트, 사용자명, 타임스탬프)는 에러가 아니라 `None`입니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// `[<digits>]` 토큰이 없거나 두 개 이상
    #[error("expected exactly one '[pid]' token, found {found}")]
    AmbiguousOrMissingPid {
        /// 발견된 토큰 수
        found: usize,
    },

    /// pid 토큰 뒤에 `": "`가 없음
    #[error("pid token is not followed by ': '")]
    MissingSeparator,

    /// pid 숫자가 u64 범위를 넘음
    #[error("pid out of range: {digits}")]
    InvalidPid {
        /// 대괄호 안의 숫자
        digits: String,
    },

    /// 마커 앞부분에 호스트명과 프로세스명이 없음
    #[error("prefix must contain at least hostname and process name")]
    MissingHeader,

    /// 최대 라인 길이 초과
    #[error("line too large: {size} bytes (max: {max})")]
    TooLarge {
        /// 라인 크기 (바이트)
        size: usize,
        /// 허용 최대 크기 (바이트)
        max: usize,
    },
}

/// 로그 파일 감시 에러
#[derive(Debug, thiserror::Error)]
pub enum TailerError {
    /// 파일 없음
    #[error("log file not found: {path}")]
    NotFound {
        /// 파일 경로
        path: String,
    },

    /// 읽기 권한 없음
    #[error("log file not readable: {path}")]
    PermissionDenied {
        /// 파일 경로
        path: String,
    },

    /// 그 외 I/O 에러
    #[error("io error on {path}: {source}")]
    Io {
        /// 파일 경로
        path: String,
        /// 원인
        #[source]
        source: std::io::Error,
    },
}

impl TailerError {
    /// I/O 에러를 종류에 맞는 변형으로 분류합니다.
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

/// 레코드 생성 에러
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// 로그인 시도가 아닌 판정으로 레코드를 만들려고 함
    #[error("verdict is not a login attempt")]
    NotAnAttempt,
}

/// 감시 루프를 멈추는 에러
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// 로그 파일 감시 실패
    #[error("tailer error: {0}")]
    Tailer(#[from] TailerError),

    /// 시작 시 싱크 연결 불가
    #[error("sink unreachable at startup: {0}")]
    SinkUnreachableAtStartup(String),

    /// 레코드 기록 실패 (재시도 없음)
    #[error("sink write failed: {0}")]
    SinkWrite(#[from] SinkError),

    /// 설정 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<WatchdogError> for MonitorError {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::SinkWrite(e) => MonitorError::Sink(e),
            WatchdogError::SinkUnreachableAtStartup(reason) => {
                MonitorError::Sink(SinkError::Unreachable(reason))
            }
            WatchdogError::Config(e) => MonitorError::Config(e),
            other @ WatchdogError::Tailer(_) => MonitorError::Watchdog(other.to_string()),
        }
    }
}
