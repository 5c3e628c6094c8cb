//! 파이프라인 trait -- 외부 협력자 확장 포인트 정의
//!
//! 감시 루프는 IP 위치 정보 조회와 시계열 저장소를 이 모듈의 trait으로만 봅니다.
//! 구체 구현(ip-api.com, InfluxDB)은 `intrusion-monitor-watchdog` 크레이트에 있고,
//! 테스트는 in-memory 구현을 주입합니다.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::types::{Enrichment, Record};

/// 컴포넌트 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// IP 위치 정보 조회 trait
///
/// 조회 실패는 에러가 아니라 `None`입니다. 구현체가 실패를 로그로 남기고,
/// 감시 루프는 위치 정보 없이 레코드를 기록합니다.
/// 감시 루프는 조회에 별도의 타임아웃을 걸지 않습니다.
///
/// # 구현 예시
/// ```ignore
/// struct StaticGateway(Enrichment);
///
/// impl EnrichmentGateway for StaticGateway {
///     fn name(&self) -> &str { "static" }
///
///     async fn lookup(&self, _ip: &str) -> Option<Enrichment> {
///         Some(self.0.clone())
///     }
/// }
/// ```
pub trait EnrichmentGateway: Send + Sync {
    /// 게이트웨이 이름 (로그용)
    fn name(&self) -> &str;

    /// IP 주소의 위치 정보를 조회합니다.
    fn lookup(&self, ip: &str) -> impl Future<Output = Option<Enrichment>> + Send;
}

/// 시계열 저장소 trait
///
/// 쓰기는 한 번만 시도합니다. 실패는 호출자에게 그대로 전파됩니다.
pub trait RecordSink: Send + Sync {
    /// 싱크 이름 (로그용)
    fn name(&self) -> &str;

    /// 연결을 확인합니다. 성공 시 서버 버전 문자열을 반환합니다.
    fn ping(&self) -> impl Future<Output = Result<String, SinkError>> + Send;

    /// 레코드 하나를 기록합니다.
    fn write(&self, record: &Record) -> impl Future<Output = Result<(), SinkError>> + Send;
}
