//! 로그 파싱 모듈 -- 인증 로그 라인을 구조화된 이벤트로 변환합니다.
//!
//! - [`LineParser`]: 라인 -> [`ParsedEvent`](intrusion_monitor_core::types::ParsedEvent)
//! - [`classify`]: 메시지 -> [`Verdict`](intrusion_monitor_core::types::Verdict)
//!
//! 둘 다 순수 함수이며 라인 간에 상태를 공유하지 않습니다.

pub mod auth;
pub mod classify;

pub use auth::{LineParser, USERNAME_PHRASES};
pub use classify::{ATTEMPT_PHRASES, classify};
