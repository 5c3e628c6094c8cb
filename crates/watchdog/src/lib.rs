#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 인증 로그 파일 감시 (추가된 라인만 배치로 수집)
//! - [`parser`]: 라인 파싱과 로그인 시도 분류
//! - [`enrich`]: IP 위치 정보 조회 (ip-api.com, 비활성화)
//! - [`record`]: `failed_logins` 레코드 생성
//! - [`sink`]: 시계열 싱크 (InfluxDB, dry-run)
//! - [`pipeline`]: 전체 감시 루프 오케스트레이션
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> LineParser -> classify -> EnrichmentGateway -> RecordBuilder -> RecordSink
//!     |             |             |              |                                  |
//!  poll/append   [pid]: split  attempt?     ip-api + cache                   line protocol
//! ```

pub mod collector;
pub mod enrich;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod sink;

// --- 주요 타입 re-export ---

// 감시 루프
pub use pipeline::{LineOutcome, Watchdog, WatchdogSettings, WatchdogState, WatchdogStats};

// 에러
pub use error::{ParseError, RecordError, TailerError, WatchdogError};

// 수집기
pub use collector::{FileTailer, TailerConfig};

// 파서
pub use parser::{LineParser, classify};

// 위치 정보
pub use enrich::{IpApiGateway, NoopGateway};

// 레코드
pub use record::RecordBuilder;

// 싱크
pub use sink::{InfluxSink, NullSink};
