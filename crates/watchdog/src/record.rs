//! 레코드 생성 -- 파싱된 이벤트와 위치 정보를 `failed_logins` 레코드로 병합합니다.
//!
//! # 태그 충돌 정책
//! 위치 정보 키는 `{tag_prefix}{key}` 이름으로 기록되므로 기본 태그를 덮어쓸 수 없습니다.
//! `tag_prefix`가 빈 문자열이면 위치 정보 값이 같은 이름의 기본 태그를 덮어쓰며,
//! 덮어쓴 키마다 debug 로그를 남깁니다.

use std::collections::BTreeMap;

use intrusion_monitor_core::config::EnrichmentConfig;
use intrusion_monitor_core::types::{
    Enrichment, FIELD_SUCCESS, MEASUREMENT, ParsedEvent, Record, Verdict, tag_keys,
};

use crate::error::RecordError;

/// 기본 위치 정보 태그 접두사
pub const DEFAULT_TAG_PREFIX: &str = "geo_";

/// `failed_logins` 레코드 생성기
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    tag_prefix: String,
}

impl RecordBuilder {
    /// 주어진 위치 정보 태그 접두사로 생성기를 만듭니다.
    pub fn new(tag_prefix: impl Into<String>) -> Self {
        Self {
            tag_prefix: tag_prefix.into(),
        }
    }

    /// 위치 정보 설정에서 생성기를 만듭니다.
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(config.tag_prefix.clone())
    }

    /// 위치 정보 태그 접두사를 반환합니다.
    pub fn tag_prefix(&self) -> &str {
        &self.tag_prefix
    }

    /// 레코드를 생성합니다.
    ///
    /// 로그인 시도가 아닌 판정이면 [`RecordError::NotAnAttempt`]를 반환합니다.
    pub fn build(
        &self,
        event: &ParsedEvent,
        verdict: &Verdict,
        enrichment: Option<&Enrichment>,
    ) -> Result<Record, RecordError> {
        if !verdict.is_attempt {
            return Err(RecordError::NotAnAttempt);
        }

        let mut tags = BTreeMap::new();
        tags.insert(tag_keys::HOSTNAME.to_owned(), event.hostname.clone());
        tags.insert(tag_keys::PROCESS_NAME.to_owned(), event.process_name.clone());
        tags.insert(tag_keys::PROCESS_ID.to_owned(), event.process_id.to_string());
        tags.insert(tag_keys::RAW_LINE.to_owned(), event.raw_line.clone());
        tags.insert(
            tag_keys::USERNAME.to_owned(),
            event.attempt_username.clone().unwrap_or_default(),
        );
        tags.insert(
            tag_keys::PORT.to_owned(),
            event
                .attempt_port
                .map(|p| p.to_string())
                .unwrap_or_default(),
        );
        tags.insert(
            tag_keys::IP.to_owned(),
            event.attempt_ip.clone().unwrap_or_default(),
        );

        if let Some(enrichment) = enrichment {
            for (key, value) in enrichment.iter() {
                let tag = format!("{}{key}", self.tag_prefix);
                if let Some(previous) = tags.insert(tag.clone(), value.to_owned()) {
                    tracing::debug!(
                        tag = %tag,
                        previous = %previous,
                        value,
                        "enrichment overrides base tag"
                    );
                }
            }
        }

        let mut fields = BTreeMap::new();
        fields.insert(FIELD_SUCCESS.to_owned(), 0);

        Ok(Record {
            measurement: MEASUREMENT.to_owned(),
            tags,
            fields,
            time: event.timestamp,
        })
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TAG_PREFIX)
    }
}
