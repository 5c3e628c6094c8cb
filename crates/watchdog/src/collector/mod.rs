//! 로그 수집 모듈 -- 인증 로그 파일에 추가된 라인을 수집합니다.
//!
//! - [`FileTailer`]: 파일 감시 (tail -f 방식, pull 기반 배치)
//!
//! 수집기는 열린 파일 핸들과 읽기 위치를 단독으로 소유하며,
//! 감시 루프가 `next_batch`를 호출할 때만 읽습니다.

pub mod file;

pub use file::{FileTailer, TailerConfig};
