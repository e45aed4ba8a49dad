//! # Relay Core
//!
//! 차트 릴레이의 공통 타입을 제공합니다.
//!
//! 이 크레이트는 릴레이 서버와 클라이언트 양쪽에서 사용되는
//! 기본 구성 요소를 제공합니다:
//! - Envelope 타입 및 JSON 코덱
//! - 에러 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod envelope;
pub mod error;
pub mod logging;

pub use config::*;
pub use envelope::*;
pub use error::*;
pub use logging::*;
