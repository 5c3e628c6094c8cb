//! intrusion-monitor.toml 통합 설정 테스트
//!
//! - intrusion-monitor.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 / 잘못된 형식 에러 테스트

use std::io::Write;

use intrusion_monitor_core::config::MonitorConfig;
use intrusion_monitor_core::error::{ConfigError, MonitorError};

const EXAMPLE: &str = include_str!("../../../intrusion-monitor.toml.example");

// =============================================================================
// intrusion-monitor.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let config = MonitorConfig::parse(EXAMPLE).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let from_file = MonitorConfig::parse(EXAMPLE).expect("should parse");
    let from_code = MonitorConfig::default();

    assert_eq!(from_file.general.log_level, from_code.general.log_level);
    assert_eq!(from_file.general.log_format, from_code.general.log_format);
    assert_eq!(from_file.general.pid_file, from_code.general.pid_file);

    assert_eq!(from_file.watchdog.log_path, from_code.watchdog.log_path);
    assert_eq!(from_file.watchdog.timezone, from_code.watchdog.timezone);
    assert_eq!(
        from_file.watchdog.poll_interval_ms,
        from_code.watchdog.poll_interval_ms
    );
    assert_eq!(
        from_file.watchdog.max_line_length,
        from_code.watchdog.max_line_length
    );
    assert_eq!(
        from_file.watchdog.startup_tail_lines,
        from_code.watchdog.startup_tail_lines
    );

    assert_eq!(from_file.sink.url, from_code.sink.url);
    assert_eq!(from_file.sink.database, from_code.sink.database);
    assert_eq!(from_file.sink.create_database, from_code.sink.create_database);
    assert_eq!(
        from_file.sink.startup_timeout_secs,
        from_code.sink.startup_timeout_secs
    );
    assert_eq!(
        from_file.sink.write_timeout_secs,
        from_code.sink.write_timeout_secs
    );

    assert_eq!(from_file.enrichment.enabled, from_code.enrichment.enabled);
    assert_eq!(from_file.enrichment.base_url, from_code.enrichment.base_url);
    assert_eq!(from_file.enrichment.fields_id, from_code.enrichment.fields_id);
    assert_eq!(
        from_file.enrichment.cache_ttl_secs,
        from_code.enrichment.cache_ttl_secs
    );
    assert_eq!(
        from_file.enrichment.cache_max_entries,
        from_code.enrichment.cache_max_entries
    );
    assert_eq!(from_file.enrichment.tag_prefix, from_code.enrichment.tag_prefix);

    assert_eq!(from_file.metrics.enabled, from_code.metrics.enabled);
    assert_eq!(from_file.metrics.port, from_code.metrics.port);
    assert_eq!(from_file.metrics.endpoint, from_code.metrics.endpoint);
}

// =============================================================================
// 부분 설정 로딩 테스트
// =============================================================================

#[test]
fn partial_config_watchdog_only() {
    let toml = r#"
[watchdog]
log_path = "/var/log/secure"
timezone = "UTC"
"#;
    let config = MonitorConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert_eq!(config.watchdog.log_path, "/var/log/secure");
    assert_eq!(config.watchdog.timezone, "UTC");
    assert_eq!(config.watchdog.poll_interval_ms, 1000);
    assert_eq!(config.sink.url, "http://localhost:8086");
}

#[test]
fn partial_config_enrichment_disabled_with_empty_prefix() {
    let toml = r#"
[enrichment]
enabled = false
tag_prefix = ""
"#;
    let config = MonitorConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");

    assert!(!config.enrichment.enabled);
    assert!(config.enrichment.tag_prefix.is_empty());
    assert_eq!(config.enrichment.timeout_secs, 5);
}

#[test]
fn wrong_value_type_is_a_parse_error() {
    let toml = r#"
[watchdog]
poll_interval_ms = "fast"
"#;
    let err = MonitorConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        MonitorError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn load_reads_file_and_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[sink]\ndatabase = \"ssh_attempts\"").expect("write");

    let config = MonitorConfig::load(file.path()).await.expect("should load");
    assert_eq!(config.sink.database, "ssh_attempts");
}

#[tokio::test]
async fn load_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[watchdog]\ntimezone = \"Nowhere/Special\"").expect("write");

    let err = MonitorConfig::load(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("watchdog.timezone"));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[sink]
database = "from_file"
"#;

    let original = std::env::var("INTRUSION_MONITOR_SINK_DATABASE").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("INTRUSION_MONITOR_SINK_DATABASE", "from_env");
    }

    let mut config = MonitorConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.sink.database.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("INTRUSION_MONITOR_SINK_DATABASE", val),
            None => std::env::remove_var("INTRUSION_MONITOR_SINK_DATABASE"),
        }
    }

    assert_eq!(result, "from_env");
}

#[test]
#[serial_test::serial]
fn legacy_tz_variable_sets_timezone() {
    let original = std::env::var("TZ").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("TZ", "Asia/Seoul");
    }

    let mut config = MonitorConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.watchdog.timezone.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("TZ", val),
            None => std::env::remove_var("TZ"),
        }
    }

    assert_eq!(result, "Asia/Seoul");
}

#[test]
#[serial_test::serial]
fn legacy_influx_port_rewrites_sink_url() {
    let original = std::env::var("INFLUXDB_PORT").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("INFLUXDB_PORT", "18086");
    }

    let mut config = MonitorConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.sink.url.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("INFLUXDB_PORT", val),
            None => std::env::remove_var("INFLUXDB_PORT"),
        }
    }

    assert_eq!(result, "http://localhost:18086");
}

#[test]
#[serial_test::serial]
fn invalid_numeric_env_keeps_file_value() {
    let original = std::env::var("INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS", "soon");
    }

    let mut config = MonitorConfig::parse("[watchdog]\npoll_interval_ms = 250").expect("parse");
    let warnings = config.apply_env_overrides();
    let result = config.watchdog.poll_interval_ms;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS", val),
            None => std::env::remove_var("INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS"),
        }
    }

    assert_eq!(result, 250);
    assert!(warnings.iter().any(|w| {
        w.env_key == "INTRUSION_MONITOR_WATCHDOG_POLL_INTERVAL_MS"
            && w.value.as_deref() == Some("soon")
    }));
}

#[test]
#[serial_test::serial]
fn invalid_legacy_influx_port_is_reported_and_ignored() {
    let original = std::env::var("INFLUXDB_PORT").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("INFLUXDB_PORT", "eighty");
    }

    let mut config = MonitorConfig::parse("").expect("should parse");
    let warnings = config.apply_env_overrides();
    let url = config.sink.url.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("INFLUXDB_PORT", val),
            None => std::env::remove_var("INFLUXDB_PORT"),
        }
    }

    assert_eq!(url, "http://localhost:8086");
    let port = warnings
        .iter()
        .find(|w| w.env_key == "INFLUXDB_PORT")
        .expect("port warning");
    assert_eq!(port.reason, "not a valid port");
}
