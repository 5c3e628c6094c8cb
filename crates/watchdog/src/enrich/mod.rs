//! IP 위치 정보 조회 구현체
//!
//! - [`NoopGateway`]: 조회 비활성화 (항상 정보 없음)
//! - [`IpApiGateway`]: ip-api.com JSON API + 메모리 캐시
//!
//! 두 구현 모두 [`EnrichmentGateway`] trait을 구현하며,
//! 실패는 `None`으로 보고합니다.

pub mod ip_api;

pub use ip_api::IpApiGateway;

use intrusion_monitor_core::pipeline::EnrichmentGateway;
use intrusion_monitor_core::types::Enrichment;

/// 위치 정보 조회를 하지 않는 게이트웨이
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGateway;

impl EnrichmentGateway for NoopGateway {
    fn name(&self) -> &str {
        "noop"
    }

    async fn lookup(&self, ip: &str) -> Option<Enrichment> {
        tracing::trace!(ip, "enrichment disabled, skipping lookup");
        None
    }
}
