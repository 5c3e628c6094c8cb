//! InfluxDB 1.x HTTP 싱크
//!
//! - `ping`: `GET /ping` (2xx 성공, 버전은 `X-Influxdb-Version` 헤더)
//! - 데이터베이스 생성: `POST /query?q=CREATE DATABASE "<db>"` (이미 있어도 성공)
//! - `write`: `POST /write?db=<db>&precision=s`, 라인 프로토콜 한 줄
//!
//! 쓰기는 한 번만 시도하며 재시도하지 않습니다.

use std::fmt::Write as _;
use std::time::Duration;

use intrusion_monitor_core::config::SinkConfig;
use intrusion_monitor_core::error::SinkError;
use intrusion_monitor_core::pipeline::RecordSink;
use intrusion_monitor_core::types::Record;
use reqwest::{Client, RequestBuilder, Response};

/// 서버 버전 헤더
const VERSION_HEADER: &str = "X-Influxdb-Version";

/// 에러 메시지에 포함할 응답 본문 최대 길이
const MAX_ERROR_BODY_CHARS: usize = 256;

/// InfluxDB 싱크
pub struct InfluxSink {
    client: Client,
    base_url: String,
    database: String,
    username: String,
    password: String,
    create_database: bool,
}

impl InfluxSink {
    /// 설정에서 싱크를 생성합니다. 연결은 `ping`에서 확인합니다.
    pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.write_timeout_secs))
            .build()
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            create_database: config.create_database,
        })
    }

    /// 대상 데이터베이스 이름
    pub fn database(&self) -> &str {
        &self.database
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        if self.username.is_empty() {
            req
        } else {
            req.basic_auth(&self.username, Some(&self.password))
        }
    }

    /// 데이터베이스를 생성합니다. 이미 존재하면 아무 일도 일어나지 않습니다.
    pub async fn ensure_database(&self) -> Result<(), SinkError> {
        let statement = format!("CREATE DATABASE \"{}\"", self.database.replace('"', "\\\""));
        tracing::debug!(database = %self.database, "creating database if missing");

        let resp = self
            .with_auth(self.client.post(self.url("query")))
            .query(&[("q", statement.as_str())])
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        expect_success(resp).await.map(|_| ())
    }
}

impl RecordSink for InfluxSink {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn ping(&self) -> Result<String, SinkError> {
        let resp = self
            .with_auth(self.client.get(self.url("ping")))
            .send()
            .await
            .map_err(|e| SinkError::Unreachable(e.to_string()))?;

        let resp = expect_success(resp).await.map_err(|e| match e {
            SinkError::Status { status, body } => {
                SinkError::Unreachable(format!("ping returned status {status}: {body}"))
            }
            other => other,
        })?;

        let version = resp
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_owned();
        tracing::debug!(version = %version, "influxdb ping ok");

        if self.create_database {
            self.ensure_database().await?;
        }

        Ok(version)
    }

    async fn write(&self, record: &Record) -> Result<(), SinkError> {
        let line = encode_line(record);
        tracing::trace!(line = %line, "writing line protocol");

        let resp = self
            .with_auth(self.client.post(self.url("write")))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(line)
            .send()
            .await
            .map_err(|e| SinkError::Write(e.to_string()))?;

        expect_success(resp).await.map(|_| ()).map_err(|e| match e {
            SinkError::Status { status, body } => {
                SinkError::Write(format!("status {status}: {body}"))
            }
            other => other,
        })
    }
}

/// 2xx가 아니면 본문 일부를 담은 [`SinkError::Status`]로 변환합니다.
async fn expect_success(resp: Response) -> Result<Response, SinkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SinkError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    })
}

/// 레코드를 라인 프로토콜 한 줄로 인코딩합니다.
///
/// `measurement,<정렬된 태그> <필드> [초 단위 타임스탬프]`
/// 빈 값의 태그는 생략합니다 (라인 프로토콜이 허용하지 않음).
pub fn encode_line(record: &Record) -> String {
    let mut line = String::with_capacity(256);
    escape_into(&mut line, &record.measurement, &[',', ' ']);

    for (key, value) in &record.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        escape_into(&mut line, key, &[',', '=', ' ']);
        line.push('=');
        escape_into(&mut line, value, &[',', '=', ' ']);
    }

    line.push(' ');
    for (i, (key, value)) in record.fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        escape_into(&mut line, key, &[',', '=', ' ']);
        let _ = write!(line, "={value}i");
    }

    if let Some(time) = record.time {
        let _ = write!(line, " {}", time.timestamp());
    }

    line
}

/// 역슬래시를 먼저 이스케이프해야 값 끝의 `\\`가 뒤따르는 구분자를 삼키지 않습니다.
fn escape_into(out: &mut String, text: &str, special: &[char]) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if special.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(tags: &[(&str, &str)], time: Option<chrono::DateTime<Utc>>) -> Record {
        Record {
            measurement: "failed_logins".to_owned(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect::<BTreeMap<_, _>>(),
            fields: BTreeMap::from([("success".to_owned(), 0)]),
            time,
        }
    }

    #[test]
    fn encodes_sorted_tags_field_and_timestamp() {
        let time = Utc.with_ymd_and_hms(2024, 1, 5, 10, 2, 3).unwrap();
        let line = encode_line(&record(
            &[("ip", "203.0.113.5"), ("hostname", "myhost"), ("port", "51234")],
            Some(time),
        ));
        assert_eq!(
            line,
            "failed_logins,hostname=myhost,ip=203.0.113.5,port=51234 success=0i 1704448923"
        );
    }

    #[test]
    fn escapes_special_characters_in_tags() {
        let line = encode_line(&record(&[("raw_line", "a b,c=d")], None));
        assert_eq!(line, r"failed_logins,raw_line=a\ b\,c\=d success=0i");
    }

    #[test]
    fn trailing_backslash_does_not_swallow_field_separator() {
        let line = encode_line(&record(
            &[("ip", "203.0.113.5"), ("username", "evil\\")],
            None,
        ));
        assert_eq!(line, r"failed_logins,ip=203.0.113.5,username=evil\\ success=0i");
        assert!(line.ends_with(" success=0i"));
    }

    #[test]
    fn escapes_backslashes_and_newlines_in_tag_values() {
        let line = encode_line(&record(&[("raw_line", "a\\,b\nc")], None));
        assert_eq!(line, r"failed_logins,raw_line=a\\\,b\nc success=0i");
    }

    #[test]
    fn omits_empty_tag_values() {
        let line = encode_line(&record(&[("username", ""), ("ip", "198.51.100.2")], None));
        assert_eq!(line, "failed_logins,ip=198.51.100.2 success=0i");
    }

    #[test]
    fn no_timestamp_when_time_absent() {
        let line = encode_line(&record(&[], None));
        assert_eq!(line, "failed_logins success=0i");
    }

    #[test]
    fn new_trims_trailing_slash() {
        let config = SinkConfig {
            url: "http://influx:8086/".to_owned(),
            ..SinkConfig::default()
        };
        let sink = InfluxSink::new(&config).unwrap();
        assert_eq!(sink.url("/ping"), "http://influx:8086/ping");
        assert_eq!(sink.database(), "intrusion_monitor");
        assert_eq!(sink.name(), "influxdb");
    }
}
