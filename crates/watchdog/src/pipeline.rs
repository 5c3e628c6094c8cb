//! 감시 루프 오케스트레이션 -- 수집/파싱/분류/위치 조회/기록의 전체 흐름을 관리합니다.
//!
//! # 상태 전이
//! ```text
//! Idle -> Tailing -> Processing -> Tailing -> ... -> Stopped
//! ```
//!
//! 한 태스크에서 라인을 파일 순서대로 하나씩 처리합니다. 병렬 쓰기는 없습니다.
//! 파싱 실패는 해당 라인만 버리며, 싱크 쓰기 실패와 파일 I/O 에러는 루프를 멈춥니다.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use intrusion_monitor_core::config::MonitorConfig;
use intrusion_monitor_core::metrics as m;
use intrusion_monitor_core::pipeline::{EnrichmentGateway, HealthStatus, RecordSink};
use intrusion_monitor_core::types::Record;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::collector::{FileTailer, TailerConfig};
use crate::error::{ParseError, WatchdogError};
use crate::parser::{LineParser, classify};
use crate::record::RecordBuilder;

/// 감시 루프 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    /// 생성됨, 아직 시작하지 않음
    Idle,
    /// 새 라인 대기 중
    Tailing,
    /// 배치 처리 중
    Processing,
    /// 정지됨 (종료 상태)
    Stopped,
}

impl WatchdogState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Tailing => "tailing",
            Self::Processing => "processing",
            Self::Stopped => "stopped",
        }
    }
}

/// 라인 하나의 처리 결과
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// 로그인 시도로 분류되어 싱크에 기록됨
    Written(Record),
    /// 로그인 시도가 아님
    NotAttempt,
    /// 파싱 실패로 버려짐
    ParseFailed(ParseError),
}

/// 감시 루프 누적 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatchdogStats {
    /// 처리한 라인 수
    pub lines_seen: u64,
    /// 파싱 실패로 버린 라인 수
    pub parse_failures: u64,
    /// 로그인 시도가 아닌 라인 수
    pub not_attempts: u64,
    /// 기록한 레코드 수
    pub records_written: u64,
    /// 위치 정보 없이 기록한 레코드 수
    pub enrichment_misses: u64,
}

/// 감시 루프 설정
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    /// 감시할 인증 로그 파일
    pub log_path: PathBuf,
    /// 수집기 설정
    pub tailer: TailerConfig,
    /// 시작 시 싱크 연결 확인 제한 시간
    pub startup_timeout: Duration,
    /// 레코드 생성기
    pub record_builder: RecordBuilder,
}

impl WatchdogSettings {
    /// 전체 설정에서 감시 루프 설정을 추출합니다.
    pub fn from_core(config: &MonitorConfig) -> Self {
        Self {
            log_path: PathBuf::from(&config.watchdog.log_path),
            tailer: TailerConfig::from_core(&config.watchdog),
            startup_timeout: Duration::from_secs(config.sink.startup_timeout_secs),
            record_builder: RecordBuilder::from_config(&config.enrichment),
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self::from_core(&MonitorConfig::default())
    }
}

/// 인증 로그 감시 루프
///
/// # 사용 예시
/// ```ignore
/// let settings = WatchdogSettings::from_core(&config);
/// let parser = LineParser::from_config(&config.watchdog)?;
/// let mut watchdog = Watchdog::new(settings, parser, NoopGateway, sink);
///
/// let stats = watchdog.run(shutdown.clone()).await?;
/// ```
pub struct Watchdog<G, S> {
    settings: WatchdogSettings,
    parser: LineParser,
    gateway: G,
    sink: S,
    state: WatchdogState,
    stats: WatchdogStats,
}

impl<G, S> Watchdog<G, S>
where
    G: EnrichmentGateway,
    S: RecordSink,
{
    /// 감시 루프를 생성합니다. 파일과 싱크는 `run`에서 엽니다.
    pub fn new(settings: WatchdogSettings, parser: LineParser, gateway: G, sink: S) -> Self {
        Self {
            settings,
            parser,
            gateway,
            sink,
            state: WatchdogState::Idle,
            stats: WatchdogStats::default(),
        }
    }

    /// 현재 상태
    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// 누적 통계
    pub fn stats(&self) -> &WatchdogStats {
        &self.stats
    }

    /// 감시 루프 설정
    pub fn settings(&self) -> &WatchdogSettings {
        &self.settings
    }

    /// 상태에 따른 건강 상태를 반환합니다.
    pub fn health_check(&self) -> HealthStatus {
        match self.state {
            WatchdogState::Tailing | WatchdogState::Processing => HealthStatus::Healthy,
            WatchdogState::Idle => HealthStatus::Unhealthy("not started".to_owned()),
            WatchdogState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }

    /// 감시 루프를 실행합니다.
    ///
    /// 로그 파일을 열고 싱크 연결을 확인한 뒤, 취소 토큰이 발동하거나
    /// 복구 불가능한 에러가 날 때까지 새 라인을 처리합니다.
    /// 취소 시 진행 중인 배치는 끝까지 처리한 뒤 멈춥니다.
    pub async fn run(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<WatchdogStats, WatchdogError> {
        let result = self.run_inner(&shutdown).await;
        self.state = WatchdogState::Stopped;

        match &result {
            Ok(stats) => tracing::info!(
                lines = stats.lines_seen,
                records = stats.records_written,
                parse_failures = stats.parse_failures,
                "watchdog stopped"
            ),
            Err(e) => tracing::error!(error = %e, "watchdog stopped with error"),
        }
        result
    }

    async fn run_inner(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<WatchdogStats, WatchdogError> {
        let mut tailer =
            FileTailer::open(&self.settings.log_path, self.settings.tailer.clone()).await?;

        self.check_sink().await?;

        self.state = WatchdogState::Tailing;
        tracing::info!(
            path = %self.settings.log_path.display(),
            sink = self.sink.name(),
            gateway = self.gateway.name(),
            "watchdog started"
        );

        while let Some(lines) = tailer.next_batch(shutdown).await? {
            self.state = WatchdogState::Processing;
            for line in &lines {
                self.process_line(line).await?;
            }
            self.state = WatchdogState::Tailing;
        }

        Ok(self.stats.clone())
    }

    /// 제한 시간 안에 싱크 연결을 확인합니다.
    async fn check_sink(&self) -> Result<(), WatchdogError> {
        let timeout = self.settings.startup_timeout;
        tracing::debug!(
            sink = self.sink.name(),
            timeout_secs = timeout.as_secs(),
            "checking sink connectivity"
        );

        match tokio::time::timeout(timeout, self.sink.ping()).await {
            Ok(Ok(version)) => {
                tracing::info!(sink = self.sink.name(), version = %version, "sink reachable");
                Ok(())
            }
            Ok(Err(e)) => Err(WatchdogError::SinkUnreachableAtStartup(e.to_string())),
            Err(_) => Err(WatchdogError::SinkUnreachableAtStartup(format!(
                "no answer within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// 라인 하나를 파싱, 분류, 위치 조회, 기록까지 처리합니다.
    ///
    /// 파싱 실패와 비시도 라인은 에러가 아닙니다. 싱크 쓰기 실패만 에러로 전파됩니다.
    pub async fn process_line(&mut self, line: &str) -> Result<LineOutcome, WatchdogError> {
        self.stats.lines_seen += 1;
        metrics::counter!(m::LINES_TOTAL).increment(1);

        let event = match self.parser.parse(line) {
            Ok(event) => event,
            Err(e) => {
                self.stats.parse_failures += 1;
                metrics::counter!(m::PARSE_ERRORS_TOTAL).increment(1);
                tracing::warn!(error = %e, line, "dropping unparseable line");
                return Ok(LineOutcome::ParseFailed(e));
            }
        };

        let verdict = classify(&event.message);
        let Some(reason) = verdict.reason.filter(|_| verdict.is_attempt) else {
            self.stats.not_attempts += 1;
            tracing::trace!(message = %event.message, "not a login attempt");
            return Ok(LineOutcome::NotAttempt);
        };
        metrics::counter!(m::ATTEMPTS_TOTAL, m::LABEL_REASON => reason).increment(1);
        tracing::debug!(event = %event, reason, "login attempt detected");

        let enrichment = match event.attempt_ip.as_deref() {
            Some(ip) => self.gateway.lookup(ip).await,
            None => None,
        };
        if enrichment.is_none() {
            self.stats.enrichment_misses += 1;
            metrics::counter!(m::ENRICHMENT_MISSES_TOTAL).increment(1);
            tracing::debug!(ip = ?event.attempt_ip, "writing record without geolocation");
        }

        let record = match self
            .settings
            .record_builder
            .build(&event, &verdict, enrichment.as_ref())
        {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "record not built");
                return Ok(LineOutcome::NotAttempt);
            }
        };

        let started = Instant::now();
        self.sink.write(&record).await?;
        metrics::histogram!(m::SINK_WRITE_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        self.stats.records_written += 1;
        metrics::counter!(m::RECORDS_WRITTEN_TOTAL).increment(1);
        tracing::info!(record = %record, "failed login recorded");

        Ok(LineOutcome::Written(record))
    }
}
