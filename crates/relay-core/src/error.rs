//! 릴레이 에러 타입.
//!
//! 라우팅 실패(`RouteNotFound`, `ConnectionClosed`)와 디코딩 실패는
//! 모두 로컬에서 복구됩니다: 로깅 후 해당 메시지만 버리고 연결은
//! 유지합니다. 연결 자체를 종료시키는 것은 `Transport` 뿐입니다.

use thiserror::Error;

/// 릴레이 전반에서 사용되는 에러.
#[derive(Debug, Error)]
pub enum RelayError {
    /// 잘못된 envelope 텍스트
    #[error("Decode error: {0}")]
    Decode(String),

    /// 수신자가 현재 등록되어 있지 않음
    #[error("Receiver not online: {0}")]
    RouteNotFound(String),

    /// 대상 세션의 연결이 이미 끊어짐
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// 클라이언트가 아직 릴레이에 연결되지 않음
    #[error("Not connected to relay")]
    NotConnected,

    /// 하위 전송 계층 장애
    #[error("Transport error: {0}")]
    Transport(String),

    /// 설정 에러
    #[error("Config error: {0}")]
    Config(String),
}

/// 릴레이 작업을 위한 Result 타입.
pub type RelayResult<T> = Result<T, RelayError>;

impl RelayError {
    /// 메시지만 버리고 연결을 유지해도 되는 에러인지 확인합니다.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RelayError::Decode(_)
                | RelayError::RouteNotFound(_)
                | RelayError::ConnectionClosed(_)
                | RelayError::NotConnected
        )
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        RelayError::Config(err.to_string())
    }
}
