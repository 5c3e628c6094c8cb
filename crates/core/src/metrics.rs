//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 감시 루프는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `intrusion_monitor_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(intrusion_monitor_core::metrics::LINES_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 분류 사유 레이블 키 ("Failed password for", "Connection closed by")
pub const LABEL_REASON: &str = "reason";

// ─── Watchdog 메트릭 ───────────────────────────────────────────────

/// 읽어 들인 로그 라인 수 (counter)
pub const LINES_TOTAL: &str = "intrusion_monitor_lines_total";

/// 파싱 실패로 버려진 라인 수 (counter)
pub const PARSE_ERRORS_TOTAL: &str = "intrusion_monitor_parse_errors_total";

/// 로그인 시도로 분류된 라인 수 (counter, label: reason)
pub const ATTEMPTS_TOTAL: &str = "intrusion_monitor_attempts_total";

/// 싱크에 기록된 레코드 수 (counter)
pub const RECORDS_WRITTEN_TOTAL: &str = "intrusion_monitor_records_written_total";

/// 위치 정보 없이 기록된 레코드 수 (counter)
pub const ENRICHMENT_MISSES_TOTAL: &str = "intrusion_monitor_enrichment_misses_total";

/// 싱크 쓰기 소요 시간 (histogram, 초)
pub const SINK_WRITE_DURATION_SECONDS: &str = "intrusion_monitor_sink_write_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "intrusion_monitor_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 싱크 쓰기 지연 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 10s 범위 (HTTP 왕복 포함)
pub const SINK_WRITE_DURATION_BUCKETS: [f64; 9] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `intrusion-monitor-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(LINES_TOTAL, "Total number of auth log lines read");
    describe_counter!(
        PARSE_ERRORS_TOTAL,
        "Total number of lines dropped because they could not be split at the pid token"
    );
    describe_counter!(
        ATTEMPTS_TOTAL,
        "Total number of lines classified as failed login attempts, by reason"
    );
    describe_counter!(
        RECORDS_WRITTEN_TOTAL,
        "Total number of failed_logins records written to the sink"
    );
    describe_counter!(
        ENRICHMENT_MISSES_TOTAL,
        "Total number of records written without geolocation data"
    );
    describe_histogram!(
        SINK_WRITE_DURATION_SECONDS,
        "Time to write a single record to the sink in seconds"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
