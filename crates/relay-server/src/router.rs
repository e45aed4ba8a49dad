//! envelope 라우팅.
//!
//! 수신된 envelope은 세 경로 중 하나로 처리됩니다:
//! 등록(`Login`), 브로커 로컬 처리, 이름 기반 포워딩.
//!
//! 포워딩은 best-effort입니다. 수신자가 오프라인이거나 전송이
//! 실패하면 로깅 후 envelope을 버리고 재큐잉하지 않습니다.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use relay_core::{Envelope, DELIVERY_FAILURE_KIND};

use crate::session::Session;
use crate::state::ServerState;

/// 한 세션에서 수신한 envelope 하나를 라우팅합니다.
pub async fn route_envelope(state: &ServerState, session: &Arc<Session>, envelope: Envelope) {
    if envelope.is_login() {
        handle_login(state, session, &envelope).await;
        return;
    }

    if envelope.receiver == state.config.broker_name {
        if let Err(e) = state.handler.handle(envelope, session).await {
            warn!("Local handler failed: {}", e);
        }
        return;
    }

    forward(state, session, envelope).await;
}

/// 등록 처리. 응답 envelope은 보내지 않습니다 (fire-and-forget).
async fn handle_login(state: &ServerState, session: &Arc<Session>, envelope: &Envelope) {
    if envelope.sender.is_empty() {
        warn!("Login without a sender name from {}, ignoring", session.id());
        return;
    }

    if !session.registered(&envelope.sender).await {
        // 이름은 세션당 한 번만 바인딩됨. 개명 시도는 레지스트리를 건드리지 않음
        warn!(
            "Session {} already registered, ignoring rename to {:?}",
            session.id(),
            envelope.sender
        );
        return;
    }

    if let Some(displaced) = state
        .registry
        .register(&envelope.sender, Arc::clone(session))
        .await
    {
        // 이름 재등록 정책: 이전 세션은 고아로 두지 않고 명시적으로 닫음
        warn!(
            "Name {:?} re-registered by {}, closing previous session {}",
            envelope.sender,
            session.id(),
            displaced.id()
        );
        displaced.close().await;
    }

    info!("Endpoint registered: {:?} ({})", envelope.sender, session.id());
}

/// 이름으로 수신자를 찾아 전달합니다.
async fn forward(state: &ServerState, session: &Arc<Session>, envelope: Envelope) {
    match state.registry.lookup(&envelope.receiver).await {
        Some(destination) => {
            debug!(
                sender = %envelope.sender,
                receiver = %envelope.receiver,
                kind = %envelope.kind,
                "Forwarding envelope"
            );
            if let Err(e) = destination.send(&envelope).await {
                warn!("Delivery to {:?} failed, dropping: {}", envelope.receiver, e);
                notify_failure(state, session, &envelope).await;
            }
        }
        None => {
            warn!(
                "Receiver not online: {:?} (type {:?}), dropping",
                envelope.receiver, envelope.kind
            );
            notify_failure(state, session, &envelope).await;
        }
    }
}

/// 전달 실패를 발신자에게 회신합니다 (설정으로 켜는 프로토콜 확장).
async fn notify_failure(state: &ServerState, session: &Arc<Session>, envelope: &Envelope) {
    if !state.config.notify_delivery_failure {
        return;
    }

    let notice = Envelope::new(
        state.config.broker_name.clone(),
        envelope.sender.clone(),
        DELIVERY_FAILURE_KIND,
        json!({
            "receiver": envelope.receiver,
            "type": envelope.kind,
            "timestamp": Utc::now().timestamp_millis(),
        }),
    );

    if let Err(e) = session.send(&notice).await {
        debug!("Could not notify sender of delivery failure: {}", e);
    }
}
