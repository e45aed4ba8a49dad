//! # Relay Server
//!
//! 이름이 지정된 엔드포인트 사이에서 envelope을 중계하는 WebSocket
//! 브로커.
//!
//! 각 엔드포인트는 연결 직후 `Login` envelope으로 논리적 이름을
//! 등록하고, 이후의 모든 envelope은 `receiver` 이름으로 라우팅됩니다.
//! 수신자가 오프라인이면 메시지는 로깅 후 버려집니다 (best-effort
//! 단일 홉 전달).
//!
//! # 와이어 형식
//!
//! ```json
//! {"sender": "Frontend", "receiver": "Backtester", "type": "get-indicator", "data": {...}}
//! {"sender": "Backtester", "receiver": "Broker", "type": "Login", "data": null}
//! ```

pub mod handler;
pub mod registry;
pub mod router;
pub mod server;
pub mod session;
pub mod state;

pub use handler::{LocalHandler, LoggingHandler};
pub use registry::Registry;
pub use router::route_envelope;
pub use server::RelayServer;
pub use session::{Session, SessionState};
pub use state::ServerState;
