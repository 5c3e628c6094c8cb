//! 로그인 시도 분류기

use intrusion_monitor_core::types::Verdict;

/// 로그인 시도로 간주하는 메시지 접두 문구 (순서대로 검사)
pub const ATTEMPT_PHRASES: [&str; 2] = ["Connection closed by", "Failed password for"];

/// 메시지가 로그인 시도인지 판정합니다.
///
/// 메시지가 [`ATTEMPT_PHRASES`] 중 하나로 시작하면 시도이며, 매칭된 문구가 사유입니다.
pub fn classify(message: &str) -> Verdict {
    ATTEMPT_PHRASES
        .into_iter()
        .find(|phrase| message.starts_with(phrase))
        .map_or_else(Verdict::not_attempt, Verdict::attempt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_password_is_attempt() {
        let v = classify("Failed password for root from 203.0.113.5 port 22 ssh2");
        assert!(v.is_attempt);
        assert_eq!(v.reason, Some("Failed password for"));
    }

    #[test]
    fn connection_closed_is_attempt() {
        let v = classify("Connection closed by 203.0.113.5 port 22 [preauth]");
        assert!(v.is_attempt);
        assert_eq!(v.reason, Some("Connection closed by"));
    }

    #[test]
    fn other_messages_are_not_attempts() {
        for message in [
            "Accepted publickey for deploy from 192.0.2.10 port 50000 ssh2",
            "Received disconnect from 203.0.113.5 port 22:11: Bye Bye",
            "pam_unix(sshd:session): session opened for user deploy",
            "",
        ] {
            assert_eq!(classify(message), Verdict::not_attempt(), "{message}");
        }
    }

    #[test]
    fn phrase_must_be_at_start() {
        let v = classify("error: Failed password for root");
        assert!(!v.is_attempt);
    }

    #[test]
    fn classification_is_deterministic() {
        let message = "Failed password for invalid user admin from 198.51.100.2 port 1 ssh2";
        assert_eq!(classify(message), classify(message));
    }
}
