//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 파서가 만드는 [`ParsedEvent`], 분류기가 만드는 [`Verdict`],
//! 위치 정보 조회 결과 [`Enrichment`], 싱크로 전달되는 [`Record`]를 정의합니다.
//! 모두 값 객체이며 라인 간에 공유되는 가변 상태가 없습니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 실패한 로그인 시도 레코드의 measurement 이름
pub const MEASUREMENT: &str = "failed_logins";

/// 레코드 필드 이름 (항상 0)
pub const FIELD_SUCCESS: &str = "success";

/// 기본 태그 키 -- 모든 레코드에 항상 존재합니다.
pub mod tag_keys {
    pub const HOSTNAME: &str = "hostname";
    pub const PROCESS_NAME: &str = "process_name";
    pub const PROCESS_ID: &str = "process_id";
    pub const RAW_LINE: &str = "raw_line";
    pub const USERNAME: &str = "username";
    pub const PORT: &str = "port";
    pub const IP: &str = "ip";

    /// 기본 태그 키 전체 목록
    pub const ALL: [&str; 7] = [HOSTNAME, PROCESS_NAME, PROCESS_ID, RAW_LINE, USERNAME, PORT, IP];
}

/// 위치 정보 속성 키 -- 조회 결과는 이 집합 안의 키만 가집니다.
pub mod enrichment_keys {
    pub const CONTINENT: &str = "continent";
    pub const CONTINENT_CODE: &str = "continent_code";
    pub const COUNTRY: &str = "country";
    pub const COUNTRY_CODE: &str = "country_code";
    pub const REGION: &str = "region";
    pub const REGION_NAME: &str = "region_name";
    pub const CITY: &str = "city";
    pub const DISTRICT: &str = "district";
    pub const ZIP: &str = "zip";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const GEOHASH: &str = "geohash";
    pub const TIMEZONE: &str = "timezone";
    pub const ISP: &str = "isp";
    pub const ORG: &str = "org";
    pub const AS: &str = "as";
    pub const ASNAME: &str = "asname";
    pub const MOBILE: &str = "mobile";
    pub const PROXY: &str = "proxy";
    pub const HOSTING: &str = "hosting";

    /// 위치 정보 속성 키 전체 목록
    pub const ALL: [&str; 20] = [
        CONTINENT,
        CONTINENT_CODE,
        COUNTRY,
        COUNTRY_CODE,
        REGION,
        REGION_NAME,
        CITY,
        DISTRICT,
        ZIP,
        LATITUDE,
        LONGITUDE,
        GEOHASH,
        TIMEZONE,
        ISP,
        ORG,
        AS,
        ASNAME,
        MOBILE,
        PROXY,
        HOSTING,
    ];
}

/// 파싱된 인증 로그 이벤트
///
/// `prefix`/`message`는 항상 채워져 있으며, 나머지 필드는 서로 독립적으로
/// 존재하거나 부재합니다. 한 필드의 추출 실패가 다른 필드에 영향을 주지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEvent {
    /// 원본 라인 (줄바꿈 제거)
    pub raw_line: String,
    /// `[pid]: ` 마커 앞부분
    pub prefix: String,
    /// `[pid]: ` 마커 뒷부분
    pub message: String,
    /// 대괄호 안의 프로세스 ID
    pub process_id: u64,
    /// prefix의 마지막 토큰
    pub process_name: String,
    /// prefix의 끝에서 두 번째 토큰
    pub hostname: String,
    /// UTC 타임스탬프 (형식 불일치 시 None)
    pub timestamp: Option<DateTime<Utc>>,
    /// 메시지에서 찾은 첫 번째 IPv4 주소
    pub attempt_ip: Option<String>,
    /// IP 뒤의 `port <n>` 값
    pub attempt_port: Option<u16>,
    /// 사용자명
    pub attempt_username: Option<String>,
    /// 메시지에서 발견된 IPv4 후보 수 (1보다 크면 모호한 라인)
    pub ip_candidates: usize,
}

impl fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}[{}]: user={} ip={} port={}",
            self.hostname,
            self.process_name,
            self.process_id,
            self.attempt_username.as_deref().unwrap_or("-"),
            self.attempt_ip.as_deref().unwrap_or("-"),
            self.attempt_port
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_owned()),
        )
    }
}

/// 분류 결과 -- 로그인 시도 여부와 매칭된 문구
///
/// 라인마다 생성되며 저장되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// 로그인 시도 여부
    pub is_attempt: bool,
    /// 매칭된 메시지 접두 문구
    pub reason: Option<&'static str>,
}

impl Verdict {
    /// 로그인 시도로 분류된 결과를 생성합니다.
    pub fn attempt(reason: &'static str) -> Self {
        Self {
            is_attempt: true,
            reason: Some(reason),
        }
    }

    /// 로그인 시도가 아닌 결과를 생성합니다.
    pub fn not_attempt() -> Self {
        Self {
            is_attempt: false,
            reason: None,
        }
    }
}

/// IP 위치 정보 조회 결과
///
/// 키는 [`enrichment_keys`]에 정의된 고정 집합에 속합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    attributes: BTreeMap<String, String>,
}

impl Enrichment {
    /// 빈 조회 결과를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 속성을 추가합니다. 빈 값은 무시됩니다.
    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.insert(key.to_owned(), value);
        }
    }

    /// 속성 값을 조회합니다.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// 모든 속성을 키 순서대로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 속성 개수를 반환합니다.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// 속성이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// 시계열 싱크로 전달되는 레코드
///
/// 태그와 필드는 키 순서로 정렬되어 있어 직렬화 결과가 결정적입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// measurement 이름 (항상 [`MEASUREMENT`])
    pub measurement: String,
    /// 태그 (문자열 -> 문자열)
    pub tags: BTreeMap<String, String>,
    /// 필드 (문자열 -> 정수)
    pub fields: BTreeMap<String, i64>,
    /// 명시적 UTC 시각. None이면 싱크가 수신 시각을 사용합니다.
    pub time: Option<DateTime<Utc>>,
}

impl Record {
    /// 태그 값을 조회합니다.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} user={} ip={} port={} tags={}",
            self.measurement,
            self.tag(tag_keys::USERNAME).unwrap_or(""),
            self.tag(tag_keys::IP).unwrap_or(""),
            self.tag(tag_keys::PORT).unwrap_or(""),
            self.tags.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_constructors() {
        let v = Verdict::attempt("Failed password for");
        assert!(v.is_attempt);
        assert_eq!(v.reason, Some("Failed password for"));

        let v = Verdict::not_attempt();
        assert!(!v.is_attempt);
        assert!(v.reason.is_none());
    }

    #[test]
    fn enrichment_ignores_empty_values() {
        let mut e = Enrichment::new();
        e.insert(enrichment_keys::CITY, "Lisbon");
        e.insert(enrichment_keys::DISTRICT, "");
        assert_eq!(e.len(), 1);
        assert_eq!(e.get("city"), Some("Lisbon"));
        assert!(e.get("district").is_none());
    }

    #[test]
    fn enrichment_iterates_in_key_order() {
        let mut e = Enrichment::new();
        e.insert(enrichment_keys::ZIP, "1000");
        e.insert(enrichment_keys::CITY, "Lisbon");
        let keys: Vec<&str> = e.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["city", "zip"]);
    }

    #[test]
    fn base_and_enrichment_key_sets_are_disjoint() {
        for key in tag_keys::ALL {
            assert!(
                !enrichment_keys::ALL.contains(&key),
                "key '{key}' must not appear in both sets"
            );
        }
    }

    #[test]
    fn parsed_event_display_uses_dash_for_missing() {
        let event = ParsedEvent {
            raw_line: String::new(),
            prefix: "Jan 5 10:02:03 myhost sshd".to_owned(),
            message: "Connection reset".to_owned(),
            process_id: 1,
            process_name: "sshd".to_owned(),
            hostname: "myhost".to_owned(),
            timestamp: None,
            attempt_ip: None,
            attempt_port: None,
            attempt_username: None,
            ip_candidates: 0,
        };
        assert_eq!(event.to_string(), "myhost sshd[1]: user=- ip=- port=-");
    }
}
