#![no_main]

use libfuzzer_sys::fuzz_target;
use intrusion_monitor_watchdog::parser::{LineParser, classify};

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    let parser = LineParser::new(chrono_tz::Europe::London).with_year(2024);

    if let Ok(event) = parser.parse(&line) {
        // prefix/message는 항상 채워져 있어야 함
        assert!(!event.process_name.is_empty());
        assert!(!event.hostname.is_empty());
        if event.attempt_port.is_some() {
            assert!(event.attempt_ip.is_some());
        }
        let _ = classify(&event.message);
    }
});
