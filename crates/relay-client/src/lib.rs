//! # Relay Client
//!
//! 릴레이 서버의 네이티브 카운터파트.
//!
//! 단일 아웃바운드 연결을 유지하며, 연결 직후 자동으로 이름을
//! 등록하고, 끊기면 고정 지연 후 무한히 재연결합니다. 수신
//! 메시지는 envelope의 `type` 태그별로 구독자에게 분배됩니다.

pub mod client;
pub mod events;

pub use client::RelayClient;
pub use events::{EventBus, HandlerId, MESSAGE_EVENT};
