//! 시계열 싱크 구현체
//!
//! - [`InfluxSink`]: InfluxDB 1.x HTTP API (라인 프로토콜)
//! - [`NullSink`]: 레코드를 버리는 싱크 (dry-run)

pub mod influx;

pub use influx::{InfluxSink, encode_line};

use intrusion_monitor_core::error::SinkError;
use intrusion_monitor_core::pipeline::RecordSink;
use intrusion_monitor_core::types::Record;

/// 모든 레코드를 버리는 싱크
///
/// 데몬의 `--parse` 모드처럼 저장소 없이 감시 경로만 실행할 때 사용합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn ping(&self) -> Result<String, SinkError> {
        Ok("null".to_owned())
    }

    async fn write(&self, record: &Record) -> Result<(), SinkError> {
        tracing::debug!(record = %record, "record discarded");
        Ok(())
    }
}
