//! 설정 관리.
//!
//! 릴레이 서버와 클라이언트의 설정을 정의하고 관리합니다.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::envelope::DEFAULT_BROKER_NAME;

/// 릴레이 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 클라이언트 설정
    #[serde(default)]
    pub client: ClientConfig,
    /// 릴레이 자신을 가리키는 예약된 수신자 이름
    #[serde(default = "default_broker_name")]
    pub broker_name: String,
    /// 전달 실패 시 발신자에게 DeliveryFailure envelope 회신 여부.
    /// 비활성 시 전달 실패는 서버 로그만 남기고 무시됩니다.
    #[serde(default)]
    pub notify_delivery_failure: bool,
}

/// 릴레이 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl ServerConfig {
    /// 바인딩 주소 문자열을 반환합니다.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8765,
        }
    }
}

/// 릴레이 클라이언트 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// 릴레이 서버 URL
    pub url: String,
    /// 등록에 사용할 논리적 엔드포인트 이름
    pub name: String,
    /// 재연결 대기 시간 (초)
    pub reconnect_delay_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
            name: "Frontend".to_string(),
            reconnect_delay_secs: 5,
        }
    }
}

fn default_broker_name() -> String {
    DEFAULT_BROKER_NAME.to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            broker_name: default_broker_name(),
            notify_delivery_failure: false,
        }
    }
}

impl RelayConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8765)?
            .set_default("broker_name", DEFAULT_BROKER_NAME)?
            .set_default("notify_delivery_failure", false)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RelayConfig::default();

        assert_eq!(config.server.port, 8765);
        assert_eq!(config.broker_name, "Broker");
        assert_eq!(config.client.reconnect_delay_secs, 5);
        assert!(!config.notify_delivery_failure);
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:9000");
    }
}
