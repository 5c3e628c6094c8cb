//! sshd 인증 로그 라인 파서
//!
//! syslog 스타일 인증 로그 한 줄을 [`ParsedEvent`]로 변환합니다.
//!
//! # 라인 형식
//! ```text
//! <Mon> <day> <HH:MM:SS> <host> <process>[<pid>]: <message>
//! Jan  5 10:02:03 myhost sshd[1234]: Failed password for root from 203.0.113.5 port 51234 ssh2
//! ```
//!
//! `[pid]: ` 마커가 정확히 하나여야 하며, 그 외 필드는 각각 독립적으로 추출됩니다.
//! 한 필드의 추출 실패는 다른 필드에 영향을 주지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use intrusion_monitor_watchdog::parser::LineParser;
//!
//! let parser = LineParser::new(chrono_tz::Europe::London);
//! let event = parser.parse("Jan 5 10:02:03 myhost sshd[1234]: Failed password for root from 203.0.113.5 port 51234 ssh2")?;
//! assert_eq!(event.attempt_username.as_deref(), Some("root"));
//! ```

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use intrusion_monitor_core::config::WatchdogConfig;
use intrusion_monitor_core::error::ConfigError;
use intrusion_monitor_core::types::ParsedEvent;
use regex::Regex;

use crate::error::ParseError;

/// 대괄호로 감싼 숫자 토큰. 라인 전체에서 정확히 하나여야 하며 뒤에 `": "`가 와야 합니다.
static PID_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("regex"));

/// pid 토큰과 메시지 사이의 구분자
const MESSAGE_SEPARATOR: &str = ": ";

/// 점으로 구분된 IPv4 형태 (범위 검증 없음)
static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("regex"));

/// 사용자명 앞에 오는 문구 (순서대로 시도, 긴 문구가 먼저)
pub const USERNAME_PHRASES: [&str; 4] = [
    "Failed password for invalid user ",
    "Failed password for ",
    "Connection closed by invalid user ",
    "Connection closed by authenticating user ",
];

/// syslog 타임스탬프 형식 (연도는 파서가 붙임)
const TIMESTAMP_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// sshd 인증 로그 파서
///
/// 시간대와 연도는 생성 시 주입되며, 파서는 환경변수를 읽지 않습니다.
#[derive(Debug, Clone)]
pub struct LineParser {
    /// 로그 타임스탬프의 시간대
    tz: Tz,
    /// 고정 연도 (None이면 현재 연도)
    year: Option<i32>,
    /// 최대 허용 라인 길이 (바이트)
    max_line_length: usize,
}

impl LineParser {
    /// 주어진 시간대로 파서를 생성합니다.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            year: None,
            max_line_length: 64 * 1024, // 64KB
        }
    }

    /// 감시 설정에서 파서를 생성합니다.
    pub fn from_config(config: &WatchdogConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.tz()?).with_max_line_length(config.max_line_length))
    }

    /// 타임스탬프에 붙일 연도를 고정합니다.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// 설정된 시간대를 반환합니다.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// 라인 하나를 파싱합니다.
    pub fn parse(&self, raw_line: &str) -> Result<ParsedEvent, ParseError> {
        let line = raw_line.trim_end_matches(['\n', '\r']);

        if line.len() > self.max_line_length {
            return Err(ParseError::TooLarge {
                size: line.len(),
                max: self.max_line_length,
            });
        }

        let (prefix, process_id, message) = split_marker(line)?;

        let mut header = prefix.split_whitespace().rev();
        let (Some(process_name), Some(hostname)) = (header.next(), header.next()) else {
            tracing::debug!(prefix, "prefix has no hostname/process tokens");
            return Err(ParseError::MissingHeader);
        };

        let timestamp = self.extract_timestamp(prefix);
        let (attempt_ip, ip_candidates) = extract_ip(message);
        let attempt_port = attempt_ip
            .as_deref()
            .and_then(|ip| extract_port(message, ip));
        let attempt_username = extract_username(message);

        Ok(ParsedEvent {
            raw_line: line.to_owned(),
            prefix: prefix.to_owned(),
            message: message.to_owned(),
            process_id,
            process_name: process_name.to_owned(),
            hostname: hostname.to_owned(),
            timestamp,
            attempt_ip,
            attempt_port,
            attempt_username,
            ip_candidates,
        })
    }

    /// prefix에서 마지막 두 토큰을 제외한 부분을 타임스탬프로 해석합니다.
    ///
    /// 형식 불일치, 존재하지 않는 날짜, DST 공백 구간의 시각은 `None`입니다.
    /// DST 중복 구간에서는 더 이른 시각을 사용합니다.
    fn extract_timestamp(&self, prefix: &str) -> Option<DateTime<Utc>> {
        let tokens: Vec<&str> = prefix.split_whitespace().collect();
        let ts_str = tokens[..tokens.len().saturating_sub(2)].join(" ");
        let year = self.year.unwrap_or_else(|| Utc::now().year());

        let naive = match NaiveDateTime::parse_from_str(
            &format!("{year} {ts_str}"),
            TIMESTAMP_FORMAT,
        ) {
            Ok(naive) => naive,
            Err(e) => {
                tracing::debug!(timestamp = %ts_str, error = %e, "timestamp format mismatch");
                return None;
            }
        };

        match self.tz.from_local_datetime(&naive).earliest() {
            Some(local) => Some(local.with_timezone(&Utc)),
            None => {
                tracing::debug!(
                    timestamp = %ts_str,
                    tz = %self.tz,
                    "local time does not exist in time zone"
                );
                None
            }
        }
    }
}

/// 라인을 `[pid]: ` 마커 기준으로 (prefix, pid, message)로 나눕니다.
///
/// 메시지 안에 있는 것까지 포함해 `[<digits>]` 토큰이 둘 이상이면 라인을 버립니다.
fn split_marker(line: &str) -> Result<(&str, u64, &str), ParseError> {
    let mut tokens = PID_TOKEN.captures_iter(line);
    let (Some(token), None) = (tokens.next(), tokens.next()) else {
        let found = PID_TOKEN.find_iter(line).count();
        tracing::debug!(found, "pid token missing or ambiguous");
        return Err(ParseError::AmbiguousOrMissingPid { found });
    };

    let (Some(whole), Some(digits)) = (token.get(0), token.get(1)) else {
        return Err(ParseError::AmbiguousOrMissingPid { found: 0 });
    };
    let Some(message) = line[whole.end()..].strip_prefix(MESSAGE_SEPARATOR) else {
        tracing::debug!(token = whole.as_str(), "pid token not followed by ': '");
        return Err(ParseError::MissingSeparator);
    };
    let process_id = digits
        .as_str()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidPid {
            digits: digits.as_str().to_owned(),
        })?;

    Ok((&line[..whole.start()], process_id, message))
}

/// 메시지에서 첫 번째 IPv4 주소와 후보 수를 찾습니다.
fn extract_ip(message: &str) -> (Option<String>, usize) {
    let candidates: Vec<&str> = IPV4.find_iter(message).map(|m| m.as_str()).collect();
    match candidates.as_slice() {
        [] => {
            tracing::debug!("no IPv4 address in message");
            (None, 0)
        }
        [only] => (Some((*only).to_owned()), 1),
        [first, ..] => {
            tracing::warn!(
                candidates = %candidates.join(", "),
                "multiple IPs found on line, keeping the first"
            );
            (Some((*first).to_owned()), candidates.len())
        }
    }
}

/// IP 뒤에 오는 `port <n>` 토큰을 찾습니다.
fn extract_port(message: &str, ip: &str) -> Option<u16> {
    let (_, after_ip) = message.split_once(ip)?;
    let Some((_, after_port)) = after_ip.split_once("port ") else {
        tracing::debug!(ip, "no 'port' token after IP");
        return None;
    };
    let token = after_port.split_whitespace().next()?;
    match token.parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            tracing::debug!(token, "port token is not a valid port number");
            None
        }
    }
}

/// 사용자명 문구를 순서대로 시도하여 첫 매칭 문구 뒤의 토큰을 반환합니다.
fn extract_username(message: &str) -> Option<String> {
    for phrase in USERNAME_PHRASES {
        if let Some((_, rest)) = message.split_once(phrase) {
            return rest
                .split_whitespace()
                .next()
                .map(str::to_owned)
                .or_else(|| {
                    tracing::debug!(phrase, "username phrase matched but no token follows");
                    None
                });
        }
    }
    tracing::debug!("no username phrase matched");
    None
}
