//! 브로커 자신에게 전달된 envelope의 처리 seam.
//!
//! `receiver`가 예약된 브로커 이름과 일치하는 envelope은 포워딩되지
//! 않고 이 트레이트로 위임됩니다. 캔들 저장소 조회 같은
//! 애플리케이션 로직은 여기서 연결됩니다.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use relay_core::{Envelope, RelayResult};

use crate::session::Session;

/// 브로커 수신 envelope 핸들러.
#[async_trait]
pub trait LocalHandler: Send + Sync {
    /// 브로커 앞으로 온 envelope을 처리합니다.
    ///
    /// 필요하면 `session`을 통해 발신자에게 직접 회신할 수 있습니다.
    async fn handle(&self, envelope: Envelope, session: &Arc<Session>) -> RelayResult<()>;
}

/// 수신 사실만 로깅하는 기본 핸들러.
pub struct LoggingHandler;

#[async_trait]
impl LocalHandler for LoggingHandler {
    async fn handle(&self, envelope: Envelope, _session: &Arc<Session>) -> RelayResult<()> {
        info!(
            sender = %envelope.sender,
            kind = %envelope.kind,
            "Broker message received"
        );
        Ok(())
    }
}
