//! 엔드포인트 세션.
//!
//! 하나의 물리적 연결과 그 연결이 등록한 논리적 이름을 나타냅니다.
//! 세션의 송신 큐는 연결별 writer 태스크가 소켓으로 비우므로,
//! `send`는 어느 태스크에서든 안전하게 호출할 수 있습니다.

use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use relay_core::{Envelope, RelayError, RelayResult};

/// 세션 수명 주기 상태.
///
/// `Connecting -> Registered -> Closed` 순서로만 전이하며 `Closed`는
/// 종료 상태입니다. 새 연결은 새 세션을 만듭니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 연결은 수락되었지만 아직 이름을 선언하지 않음
    Connecting,
    /// 이름이 레지스트리에 등록되어 양방향으로 envelope이 흐름
    Registered,
    /// 연결 종료 (종료 상태)
    Closed,
}

/// 하나의 살아있는 연결.
pub struct Session {
    id: Uuid,
    name: RwLock<Option<String>>,
    state: RwLock<SessionState>,
    outbound: mpsc::Sender<Message>,
    shutdown: CancellationToken,
}

impl Session {
    /// 송신 큐를 받아 새 세션을 생성합니다.
    pub fn new(outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: RwLock::new(None),
            state: RwLock::new(SessionState::Connecting),
            outbound,
            shutdown: CancellationToken::new(),
        }
    }

    /// 세션 식별자.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 등록된 논리적 이름.
    pub async fn name(&self) -> Option<String> {
        self.name.read().await.clone()
    }

    /// 현재 수명 주기 상태.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// 연결 강제 종료용 토큰. 연결 핸들러가 이 토큰을 감시합니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 등록 완료 처리. 이름을 바인딩하고 `Registered`로 전이합니다.
    ///
    /// 이름은 세션당 정확히 한 번 바인딩됩니다. 이미 다른 이름이
    /// 바인딩되어 있으면 `false`를 반환하며 아무것도 바꾸지 않습니다.
    pub async fn registered(&self, name: &str) -> bool {
        let mut bound = self.name.write().await;
        match bound.as_deref() {
            Some(existing) if existing != name => return false,
            _ => *bound = Some(name.to_string()),
        }

        let mut state = self.state.write().await;
        if *state == SessionState::Connecting {
            *state = SessionState::Registered;
        }
        true
    }

    /// envelope을 이 세션의 연결로 전송합니다.
    ///
    /// 닫혔거나 끊어진 연결에 대해서는 `ConnectionClosed`를 반환하며,
    /// 호출자는 이를 "수신자 도달 불가"로 취급해야 합니다. 재시도는
    /// 하지 않습니다.
    pub async fn send(&self, envelope: &Envelope) -> RelayResult<()> {
        if self.state().await == SessionState::Closed {
            return Err(RelayError::ConnectionClosed(self.id.to_string()));
        }

        let json = envelope.to_json()?;
        self.outbound
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| RelayError::ConnectionClosed(self.id.to_string()))
    }

    /// 세션을 닫습니다. 멱등적이며, 연결 핸들러의 종료를 트리거합니다.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        if *state == SessionState::Closed {
            return;
        }
        *state = SessionState::Closed;
        self.shutdown.cancel();
    }

    /// 로그 라인용 표시 이름.
    pub async fn describe(&self) -> String {
        match self.name().await {
            Some(name) => format!("{} ({})", name, self.id),
            None => self.id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_session() -> (Session, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(8);
        (Session::new(tx), rx)
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (session, _rx) = make_session();
        assert_eq!(session.state().await, SessionState::Connecting);
        assert_eq!(session.name().await, None);

        assert!(session.registered("Frontend").await);
        assert_eq!(session.state().await, SessionState::Registered);
        assert_eq!(session.name().await, Some("Frontend".to_string()));

        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_name_binds_exactly_once() {
        let (session, _rx) = make_session();

        assert!(session.registered("Frontend").await);
        // 같은 이름으로 다시 등록하는 것은 허용
        assert!(session.registered("Frontend").await);
        // 다른 이름으로 바꾸려는 시도는 거부됨
        assert!(!session.registered("Backtester").await);
        assert_eq!(session.name().await, Some("Frontend".to_string()));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, _rx) = make_session();
        session.close().await;
        session.close().await;
        assert_eq!(session.state().await, SessionState::Closed);
    }

    #[tokio::test]
    async fn test_send_queues_encoded_envelope() {
        let (session, mut rx) = make_session();
        let envelope = Envelope::new("A", "B", "tick", json!({"price": 1.5}));

        session.send(&envelope).await.unwrap();

        let msg = rx.recv().await.unwrap();
        let text = msg.to_text().unwrap();
        assert_eq!(Envelope::from_json(text).unwrap(), envelope);
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (session, _rx) = make_session();
        session.close().await;

        let envelope = Envelope::new("A", "B", "tick", json!(null));
        let result = session.send(&envelope).await;
        assert!(matches!(result, Err(RelayError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_send_on_dropped_queue_fails() {
        let (session, rx) = make_session();
        drop(rx);

        let envelope = Envelope::new("A", "B", "tick", json!(null));
        let result = session.send(&envelope).await;
        assert!(matches!(result, Err(RelayError::ConnectionClosed(_))));
    }
}
