#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use intrusion_monitor_core::types::{Enrichment, enrichment_keys};
use intrusion_monitor_watchdog::parser::{LineParser, classify};
use intrusion_monitor_watchdog::record::RecordBuilder;
use intrusion_monitor_watchdog::sink::encode_line;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 메시지 앞부분 (타임스탬프 + 호스트 + 프로세스)
    prefix: String,
    /// pid
    pid: u64,
    /// `[pid]: ` 뒤의 메시지
    message: String,
    /// 위치 정보 도시 값
    city: Option<String>,
    /// 위치 정보 태그 접두사
    tag_prefix: String,
    /// 시간대 선택 (UTC, London, Seoul)
    tz: u8,
}

fuzz_target!(|input: FuzzInput| {
    let tz = match input.tz % 3 {
        0 => chrono_tz::UTC,
        1 => chrono_tz::Europe::London,
        _ => chrono_tz::Asia::Seoul,
    };
    let parser = LineParser::new(tz).with_year(2024);
    let line = format!("{}[{}]: {}", input.prefix, input.pid, input.message);

    let Ok(event) = parser.parse(&line) else {
        return;
    };
    let verdict = classify(&event.message);

    let enrichment = input.city.map(|city| {
        let mut e = Enrichment::new();
        e.insert(enrichment_keys::CITY, city);
        e
    });

    let builder = RecordBuilder::new(input.tag_prefix);
    match builder.build(&event, &verdict, enrichment.as_ref()) {
        Ok(record) => {
            assert!(verdict.is_attempt);
            let encoded = encode_line(&record);
            assert!(encoded.starts_with("failed_logins"));
        }
        Err(_) => assert!(!verdict.is_attempt),
    }
});
