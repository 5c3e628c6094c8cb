//! 통합 테스트 -- 감시 루프 전체 흐름 검증
//!
//! 파일 추가부터 싱크 기록까지의 흐름을 in-memory 게이트웨이와 싱크로 검증합니다.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono_tz::Europe::London;
use tokio_util::sync::CancellationToken;

use intrusion_monitor_core::error::SinkError;
use intrusion_monitor_core::pipeline::{EnrichmentGateway, RecordSink};
use intrusion_monitor_core::types::{Enrichment, Record, enrichment_keys};
use intrusion_monitor_watchdog::{
    LineOutcome, LineParser, NoopGateway, TailerConfig, TailerError, Watchdog, WatchdogError,
    WatchdogSettings, WatchdogState,
};

// --- 테스트용 협력자 ---

/// IP별 고정 응답 게이트웨이
#[derive(Default)]
struct MapGateway(HashMap<String, Enrichment>);

impl MapGateway {
    fn with(ip: &str, city: &str) -> Self {
        let mut e = Enrichment::new();
        e.insert(enrichment_keys::CITY, city);
        e.insert(enrichment_keys::COUNTRY, "Portugal");
        Self(HashMap::from([(ip.to_owned(), e)]))
    }
}

impl EnrichmentGateway for MapGateway {
    fn name(&self) -> &str {
        "map"
    }

    async fn lookup(&self, ip: &str) -> Option<Enrichment> {
        self.0.get(ip).cloned()
    }
}

/// 기록된 레코드를 보관하는 싱크
#[derive(Clone, Default)]
struct RecordingSink {
    records: Arc<Mutex<Vec<Record>>>,
    pinged: Arc<AtomicBool>,
}

impl RecordingSink {
    fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn ping(&self) -> Result<String, SinkError> {
        self.pinged.store(true, Ordering::SeqCst);
        Ok("test".to_owned())
    }

    async fn write(&self, record: &Record) -> Result<(), SinkError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// ping 또는 write가 실패하는 싱크
#[derive(Clone, Copy)]
enum BrokenSink {
    Unreachable,
    Hanging,
    RejectsWrites,
}

impl RecordSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    async fn ping(&self) -> Result<String, SinkError> {
        match self {
            Self::Unreachable => Err(SinkError::Unreachable("connection refused".to_owned())),
            Self::Hanging => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("late".to_owned())
            }
            Self::RejectsWrites => Ok("test".to_owned()),
        }
    }

    async fn write(&self, _record: &Record) -> Result<(), SinkError> {
        Err(SinkError::Write("database not found".to_owned()))
    }
}

// --- 헬퍼 ---

fn parser() -> LineParser {
    LineParser::new(London).with_year(2024)
}

fn settings(log_path: &Path) -> WatchdogSettings {
    WatchdogSettings {
        log_path: log_path.to_path_buf(),
        tailer: TailerConfig {
            poll_interval_ms: 10,
            ..TailerConfig::default()
        },
        startup_timeout: Duration::from_millis(200),
        ..WatchdogSettings::default()
    }
}

fn append(path: &Path, text: &str) {
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    f.write_all(text.as_bytes()).unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

const SCENARIO_1: &str =
    "Jan 5 10:02:03 myhost sshd[1234]: Failed password for root from 203.0.113.5 port 51510 ssh2";
const SCENARIO_2: &str = "Jan 5 10:02:04 myhost sshd[1234]: Connection closed by invalid user baa 203.0.113.6 port 22 [preauth]";
const SCENARIO_3: &str = "Jan 5 10:02:05 myhost sshd[1234]: Failed password for root from ::1 port 22 ssh2";

// --- 라인 단위 흐름 ---

#[tokio::test]
async fn scenario_failed_password_is_recorded_with_fields() {
    let sink = RecordingSink::default();
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        NoopGateway,
        sink.clone(),
    );

    let outcome = wd.process_line(SCENARIO_1).await.unwrap();
    let LineOutcome::Written(record) = outcome else {
        panic!("expected written record, got {outcome:?}");
    };

    assert_eq!(record.measurement, "failed_logins");
    assert_eq!(record.tag("username"), Some("root"));
    assert_eq!(record.tag("ip"), Some("203.0.113.5"));
    assert_eq!(record.tag("port"), Some("51510"));
    assert_eq!(record.tag("hostname"), Some("myhost"));
    assert_eq!(record.tag("process_id"), Some("1234"));
    assert_eq!(record.fields.get("success"), Some(&0));
    assert!(record.time.is_some());
    assert_eq!(sink.records(), vec![record]);
}

#[tokio::test]
async fn scenario_connection_closed_invalid_user() {
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        NoopGateway,
        RecordingSink::default(),
    );

    let LineOutcome::Written(record) = wd.process_line(SCENARIO_2).await.unwrap() else {
        panic!("expected written record");
    };
    assert_eq!(record.tag("username"), Some("baa"));
    assert_eq!(record.tag("ip"), Some("203.0.113.6"));
    assert_eq!(record.tag("port"), Some("22"));
}

#[tokio::test]
async fn scenario_no_ipv4_still_produces_record() {
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        MapGateway::with("203.0.113.5", "Lisbon"),
        RecordingSink::default(),
    );

    let LineOutcome::Written(record) = wd.process_line(SCENARIO_3).await.unwrap() else {
        panic!("expected written record");
    };
    assert_eq!(record.tag("ip"), Some(""));
    assert_eq!(record.tag("port"), Some(""));
    assert_eq!(record.tag("username"), Some("root"));
    assert_eq!(record.tag("geo_city"), None);
    assert_eq!(wd.stats().enrichment_misses, 1);
}

#[tokio::test]
async fn enrichment_is_merged_under_prefix() {
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        MapGateway::with("203.0.113.5", "Lisbon"),
        RecordingSink::default(),
    );

    let LineOutcome::Written(record) = wd.process_line(SCENARIO_1).await.unwrap() else {
        panic!("expected written record");
    };
    assert_eq!(record.tag("geo_city"), Some("Lisbon"));
    assert_eq!(record.tag("geo_country"), Some("Portugal"));
    assert_eq!(wd.stats().enrichment_misses, 0);
}

#[tokio::test]
async fn enrichment_failure_never_blocks_record() {
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        MapGateway::default(),
        RecordingSink::default(),
    );

    for line in [SCENARIO_1, SCENARIO_2, SCENARIO_3] {
        let outcome = wd.process_line(line).await.unwrap();
        assert!(matches!(outcome, LineOutcome::Written(_)), "{line}");
    }
    assert_eq!(wd.stats().records_written, 3);
    assert_eq!(wd.stats().enrichment_misses, 3);
}

#[tokio::test]
async fn same_batch_twice_yields_identical_records() {
    let sink = RecordingSink::default();
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        NoopGateway,
        sink.clone(),
    );

    let batch = [SCENARIO_1, SCENARIO_2, SCENARIO_3];
    for line in batch.iter().chain(batch.iter()) {
        wd.process_line(line).await.unwrap();
    }

    let records = sink.records();
    assert_eq!(records.len(), 6);
    assert_eq!(records[..3], records[3..]);
}

#[tokio::test]
async fn write_failure_propagates() {
    let mut wd = Watchdog::new(
        WatchdogSettings::default(),
        parser(),
        NoopGateway,
        BrokenSink::RejectsWrites,
    );

    let err = wd.process_line(SCENARIO_1).await.unwrap_err();
    assert!(matches!(err, WatchdogError::SinkWrite(_)));
    assert_eq!(wd.stats().records_written, 0);
}

// --- 감시 루프 ---

#[tokio::test]
async fn run_records_appended_attempts_in_file_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(
        &log,
        "Jan 5 09:00:00 myhost sshd[1]: Failed password for old from 192.0.2.1 port 1 ssh2\n",
    )
    .unwrap();

    let sink = RecordingSink::default();
    let mut wd = Watchdog::new(settings(&log), parser(), NoopGateway, sink.clone());
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let result = wd.run(shutdown).await;
            (result, wd.state())
        }
    });

    let pinged = sink.pinged.clone();
    wait_until(|| pinged.load(Ordering::SeqCst)).await;

    append(
        &log,
        &format!(
            "{SCENARIO_1}\nJan 5 10:02:04 myhost sshd[99]: Accepted publickey for deploy from 192.0.2.10 port 50000 ssh2\n\nbroken line without marker\n{SCENARIO_2}\n"
        ),
    );

    let records = sink.records.clone();
    wait_until(|| records.lock().unwrap().len() >= 2).await;
    shutdown.cancel();

    let (result, state) = handle.await.unwrap();
    let stats = result.unwrap();
    assert_eq!(state, WatchdogState::Stopped);
    assert_eq!(stats.lines_seen, 4);
    assert_eq!(stats.records_written, 2);
    assert_eq!(stats.not_attempts, 1);
    assert_eq!(stats.parse_failures, 1);

    let written = sink.records();
    assert_eq!(written[0].tag("port"), Some("51510"));
    assert_eq!(written[1].tag("username"), Some("baa"));
    assert!(written.iter().all(|r| r.tag("username") != Some("old")));
}

#[tokio::test]
async fn run_stops_cleanly_when_already_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(&log, "").unwrap();

    let mut wd = Watchdog::new(
        settings(&log),
        parser(),
        NoopGateway,
        RecordingSink::default(),
    );
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let stats = wd.run(shutdown).await.unwrap();
    assert_eq!(stats.lines_seen, 0);
    assert_eq!(wd.state(), WatchdogState::Stopped);
    assert!(wd.health_check().is_unhealthy());
}

#[tokio::test]
async fn run_fails_when_log_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut wd = Watchdog::new(
        settings(&dir.path().join("missing.log")),
        parser(),
        NoopGateway,
        RecordingSink::default(),
    );

    let err = wd.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        WatchdogError::Tailer(TailerError::NotFound { .. })
    ));
    assert_eq!(wd.state(), WatchdogState::Stopped);
}

#[tokio::test]
async fn run_refuses_to_start_when_sink_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(&log, "").unwrap();

    let mut wd = Watchdog::new(settings(&log), parser(), NoopGateway, BrokenSink::Unreachable);
    let err = wd.run(CancellationToken::new()).await.unwrap_err();
    match err {
        WatchdogError::SinkUnreachableAtStartup(reason) => {
            assert!(reason.contains("connection refused"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn run_refuses_to_start_when_sink_ping_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(&log, "").unwrap();

    let mut wd = Watchdog::new(settings(&log), parser(), NoopGateway, BrokenSink::Hanging);
    let started = std::time::Instant::now();
    let err = wd.run(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, WatchdogError::SinkUnreachableAtStartup(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn run_stops_on_sink_write_failure() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("auth.log");
    std::fs::write(&log, "").unwrap();

    let mut wd = Watchdog::new(
        settings(&log),
        parser(),
        NoopGateway,
        BrokenSink::RejectsWrites,
    );
    let handle = tokio::spawn(async move { wd.run(CancellationToken::new()).await });

    // 파일을 연 뒤에 추가해야 새 라인으로 인식됨
    tokio::time::sleep(Duration::from_millis(100)).await;
    append(&log, &format!("{SCENARIO_1}\n"));

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watchdog should stop on write failure")
        .unwrap();
    assert!(matches!(result, Err(WatchdogError::SinkWrite(_))));
}
