//! 서버 공유 상태.

use std::sync::Arc;

use relay_core::RelayConfig;

use crate::handler::LocalHandler;
use crate::registry::Registry;

/// 모든 연결 태스크가 공유하는 서버 상태.
#[derive(Clone)]
pub struct ServerState {
    /// 엔드포인트 레지스트리
    pub registry: Arc<Registry>,
    /// 릴레이 설정
    pub config: Arc<RelayConfig>,
    /// 브로커 수신 envelope 핸들러
    pub handler: Arc<dyn LocalHandler>,
}

impl ServerState {
    pub fn new(config: RelayConfig, handler: Arc<dyn LocalHandler>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            config: Arc::new(config),
            handler,
        }
    }
}
