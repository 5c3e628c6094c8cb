//! 설정 관리 -- intrusion-monitor.toml 파싱 및 런타임 설정
//!
//! [`MonitorConfig`]는 모든 컴포넌트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`INTRUSION_MONITOR_WATCHDOG_TIMEZONE=UTC` 형식)
//! 3. 레거시 환경변수 (`TZ`, `SSH_LOG_PATH`, `INFLUXDB_HOST` 등)
//! 4. 설정 파일 (`intrusion-monitor.toml`)
//! 5. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), intrusion_monitor_core::error::MonitorError> {
//! use intrusion_monitor_core::config::MonitorConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = MonitorConfig::load("intrusion-monitor.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = MonitorConfig::parse("[watchdog]\ntimezone = \"UTC\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, MonitorError};

/// intrusion-monitor 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 인증 로그 감시 설정
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// 시계열 싱크 (InfluxDB) 설정
    #[serde(default)]
    pub sink: SinkConfig,
    /// IP 위치 정보 조회 설정
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl MonitorConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let mut config = Self::from_file(path).await?;
        for warning in config.apply_env_overrides() {
            warning.log();
        }
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MonitorError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                MonitorError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, MonitorError> {
        toml::from_str(toml_str).map_err(|e| {
            MonitorError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 레거시 이름을 먼저 적용하고, `INTRUSION_MONITOR_{SECTION}_{FIELD}`
    /// 이름을 나중에 적용합니다. 두 이름이 모두 설정되면 후자가 이깁니다.
    ///
    /// 무시된 값(빈 값, 파싱 실패, IANA가 아닌 시간대)은 로그로 남기지 않고
    /// [`EnvWarning`] 목록으로 돌려줍니다. 설정이 끝나야 tracing을 초기화할 수
    /// 있으므로, 호출자가 subscriber 설치 후 [`EnvWarning::log`]로 출력합니다.
    pub fn apply_env_overrides(&mut self) -> Vec<EnvWarning> {
        let mut env = EnvReader::default();
        self.apply_legacy_env_overrides(&mut env);

        // General
        env.string(
            &mut self.general.log_level,
            "INTRUSION_MONITOR_GENERAL_LOG_LEVEL",
        );
        env.string(
            &mut self.general.log_format,
            "INTRUSION_MONITOR_GENERAL_LOG_FORMAT",
        );
        env.string(
            &mut self.general.pid_file,
            "INTRUSION_MONITOR_GENERAL_PID_FILE",
        );

        // Watchdog
        env.string(
            &mut self.watchdog.log_path,
            "INTRUSION_MONITOR_WATCHDOG_LOG_PATH",
        );
        env.string(
            &mut self.watchdog.timezone,
            "INTRUSION_MONITOR_WATCHDOG_TIMEZONE",
        );
        env.parse(
            &mut self.watchdog.poll_interval_ms,
            "INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS",
        );
        env.parse(
            &mut self.watchdog.max_line_length,
            "INTRUSION_MONITOR_WATCHDOG_MAX_LINE_LENGTH",
        );
        env.parse(
            &mut self.watchdog.startup_tail_lines,
            "INTRUSION_MONITOR_WATCHDOG_STARTUP_TAIL_LINES",
        );

        // Sink
        env.string(&mut self.sink.url, "INTRUSION_MONITOR_SINK_URL");
        env.string(&mut self.sink.database, "INTRUSION_MONITOR_SINK_DATABASE");
        env.string(&mut self.sink.username, "INTRUSION_MONITOR_SINK_USERNAME");
        env.string(&mut self.sink.password, "INTRUSION_MONITOR_SINK_PASSWORD");
        env.parse(
            &mut self.sink.create_database,
            "INTRUSION_MONITOR_SINK_CREATE_DATABASE",
        );
        env.parse(
            &mut self.sink.startup_timeout_secs,
            "INTRUSION_MONITOR_SINK_STARTUP_TIMEOUT_SECS",
        );
        env.parse(
            &mut self.sink.write_timeout_secs,
            "INTRUSION_MONITOR_SINK_WRITE_TIMEOUT_SECS",
        );

        // Enrichment
        env.parse(
            &mut self.enrichment.enabled,
            "INTRUSION_MONITOR_ENRICHMENT_ENABLED",
        );
        env.string(
            &mut self.enrichment.base_url,
            "INTRUSION_MONITOR_ENRICHMENT_BASE_URL",
        );
        env.parse(
            &mut self.enrichment.fields_id,
            "INTRUSION_MONITOR_ENRICHMENT_FIELDS_ID",
        );
        env.parse(
            &mut self.enrichment.timeout_secs,
            "INTRUSION_MONITOR_ENRICHMENT_TIMEOUT_SECS",
        );
        env.parse(
            &mut self.enrichment.cache_ttl_secs,
            "INTRUSION_MONITOR_ENRICHMENT_CACHE_TTL_SECS",
        );
        env.parse(
            &mut self.enrichment.cache_max_entries,
            "INTRUSION_MONITOR_ENRICHMENT_CACHE_MAX_ENTRIES",
        );
        env.string(
            &mut self.enrichment.tag_prefix,
            "INTRUSION_MONITOR_ENRICHMENT_TAG_PREFIX",
        );

        // Metrics
        env.parse(&mut self.metrics.enabled, "INTRUSION_MONITOR_METRICS_ENABLED");
        env.string(
            &mut self.metrics.listen_addr,
            "INTRUSION_MONITOR_METRICS_LISTEN_ADDR",
        );
        env.parse(&mut self.metrics.port, "INTRUSION_MONITOR_METRICS_PORT");
        env.string(
            &mut self.metrics.endpoint,
            "INTRUSION_MONITOR_METRICS_ENDPOINT",
        );

        env.warnings
    }

    /// 컨테이너 배포에서 쓰이던 환경변수 이름을 적용합니다.
    fn apply_legacy_env_overrides(&mut self, env: &mut EnvReader) {
        env.timezone(&mut self.watchdog.timezone, "TZ");
        env.string(&mut self.watchdog.log_path, "SSH_LOG_PATH");
        env.string(&mut self.general.log_level, "LOG_LEVEL");
        self.general.log_level = self.general.log_level.to_lowercase();
        env.string(&mut self.sink.database, "INFLUXDB_DATABASE");
        env.string(&mut self.sink.username, "INFLUXDB_USER");
        env.string(&mut self.sink.password, "INFLUXDB_PASSWORD");

        let host = env.non_empty("INFLUXDB_HOST");
        let port = env.non_empty("INFLUXDB_PORT");
        let port = match port {
            Some(p) if p.parse::<u16>().is_err() => {
                env.reject("INFLUXDB_PORT", p, "not a valid port");
                None
            }
            other => other,
        };
        if host.is_some() || port.is_some() {
            self.sink.url = rebuild_sink_url(&self.sink.url, host.as_deref(), port.as_deref());
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.watchdog.log_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "watchdog.log_path".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        self.watchdog.tz()?;

        if self.watchdog.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watchdog.poll_interval_ms".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.watchdog.max_line_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "watchdog.max_line_length".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        if !has_http_scheme(&self.sink.url) {
            return Err(ConfigError::InvalidValue {
                field: "sink.url".to_owned(),
                reason: "must start with http:// or https://".to_owned(),
            }
            .into());
        }

        if self.sink.database.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sink.database".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.sink.startup_timeout_secs == 0 || self.sink.write_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sink.startup_timeout_secs".to_owned(),
                reason: "timeouts must be greater than 0".to_owned(),
            }
            .into());
        }

        if self.enrichment.enabled {
            if !has_http_scheme(&self.enrichment.base_url) {
                return Err(ConfigError::InvalidValue {
                    field: "enrichment.base_url".to_owned(),
                    reason: "must start with http:// or https://".to_owned(),
                }
                .into());
            }
            if self.enrichment.timeout_secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "enrichment.timeout_secs".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
        }

        if self.metrics.enabled && !self.metrics.endpoint.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "metrics.endpoint".to_owned(),
                reason: "must start with '/'".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            pid_file: String::new(),
        }
    }
}

/// 인증 로그 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// 감시할 인증 로그 파일 경로
    pub log_path: String,
    /// 로그 타임스탬프의 IANA 시간대
    pub timezone: String,
    /// 새 데이터가 없을 때 대기 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 허용되는 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 시작 시 진단용으로 출력할 기존 라인 수
    pub startup_tail_lines: usize,
}

impl WatchdogConfig {
    /// 설정된 시간대를 파싱합니다.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "watchdog.timezone".to_owned(),
                reason: e.to_string(),
            })
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            log_path: "/watchdog/log/auth.log".to_owned(),
            timezone: "Europe/London".to_owned(),
            poll_interval_ms: 1000,
            max_line_length: 64 * 1024, // 64KB
            startup_tail_lines: 5,
        }
    }
}

/// 시계열 싱크 (InfluxDB 1.x HTTP API) 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// InfluxDB 기본 URL
    pub url: String,
    /// 데이터베이스 이름
    pub database: String,
    /// 사용자명 (빈 문자열이면 인증 없음)
    pub username: String,
    /// 비밀번호
    pub password: String,
    /// 시작 시 `CREATE DATABASE` 실행 여부
    pub create_database: bool,
    /// 시작 시 연결 확인 제한 시간 (초)
    pub startup_timeout_secs: u64,
    /// 레코드 기록 요청 제한 시간 (초)
    pub write_timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_owned(),
            database: "intrusion_monitor".to_owned(),
            username: String::new(),
            password: String::new(),
            create_database: true,
            startup_timeout_secs: 3,
            write_timeout_secs: 10,
        }
    }
}

/// IP 위치 정보 조회 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// ip-api 기본 URL
    pub base_url: String,
    /// 응답 필드 선택 비트마스크
    pub fields_id: u64,
    /// 요청 제한 시간 (초)
    pub timeout_secs: u64,
    /// 캐시 유지 시간 (초)
    pub cache_ttl_secs: u64,
    /// 캐시 최대 엔트리 수
    pub cache_max_entries: usize,
    /// 레코드 태그에 붙는 접두사 (빈 문자열이면 기본 태그를 덮어씀)
    pub tag_prefix: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://ip-api.com".to_owned(),
            fields_id: 66_846_719,
            timeout_secs: 5,
            cache_ttl_secs: 7 * 24 * 60 * 60,
            cache_max_entries: 10_000,
            tag_prefix: "geo_".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 노출 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

fn has_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// 기존 URL의 scheme/host/port 중 주어진 부분만 교체합니다.
fn rebuild_sink_url(current: &str, host: Option<&str>, port: Option<&str>) -> String {
    let (scheme, rest) = current.split_once("://").unwrap_or(("http", current));
    let authority = rest.split('/').next().unwrap_or_default();
    let (current_host, current_port) = authority.rsplit_once(':').unwrap_or((authority, "8086"));
    format!(
        "{scheme}://{}:{}",
        host.unwrap_or(current_host),
        port.unwrap_or(current_port)
    )
}

// --- 환경변수 오버라이드 헬퍼 ---

/// 무시된 환경변수 값
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvWarning {
    /// 환경변수 이름
    pub env_key: String,
    /// 설정된 값 (빈 값이면 None)
    pub value: Option<String>,
    /// 무시한 이유
    pub reason: &'static str,
}

impl EnvWarning {
    /// 경고 레벨로 출력합니다.
    pub fn log(&self) {
        match &self.value {
            Some(value) => warn!(
                env_key = %self.env_key,
                value = %value,
                "env var ignored: {}",
                self.reason
            ),
            None => warn!(env_key = %self.env_key, "env var ignored: {}", self.reason),
        }
    }
}

impl std::fmt::Display for EnvWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={:?} ignored: {}", self.env_key, value, self.reason),
            None => write!(f, "{} ignored: {}", self.env_key, self.reason),
        }
    }
}

/// 환경변수를 읽으며 무시한 값을 모아 둡니다.
#[derive(Debug, Default)]
struct EnvReader {
    warnings: Vec<EnvWarning>,
}

impl EnvReader {
    fn reject(&mut self, env_key: &str, value: String, reason: &'static str) {
        self.warnings.push(EnvWarning {
            env_key: env_key.to_owned(),
            value: Some(value),
            reason,
        });
    }

    fn non_empty(&mut self, env_key: &str) -> Option<String> {
        match std::env::var(env_key) {
            Ok(val) if val.is_empty() => {
                self.warnings.push(EnvWarning {
                    env_key: env_key.to_owned(),
                    value: None,
                    reason: "set but empty",
                });
                None
            }
            Ok(val) => Some(val),
            Err(_) => None,
        }
    }

    fn string(&mut self, target: &mut String, env_key: &str) {
        if let Some(val) = self.non_empty(env_key) {
            *target = val;
        }
    }

    fn timezone(&mut self, target: &mut String, env_key: &str) {
        if let Some(val) = self.non_empty(env_key) {
            match val.parse::<Tz>() {
                Ok(_) => *target = val,
                Err(_) => self.reject(env_key, val, "not an IANA time zone"),
            }
        }
    }

    fn parse<T: std::str::FromStr>(&mut self, target: &mut T, env_key: &str) {
        if let Some(val) = self.non_empty(env_key) {
            match val.parse::<T>() {
                Ok(parsed) => *target = parsed,
                Err(_) => self.reject(env_key, val, "failed to parse"),
            }
        }
    }
}
