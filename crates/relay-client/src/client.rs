//! 재연결하는 릴레이 클라이언트.
//!
//! 백그라운드 태스크가 연결 수명을 관리합니다: 연결 -> login 전송
//! -> 프레임 펌프 -> 끊기면 고정 지연 후 재시도. 끊김은 클라이언트에
//! 치명적이지 않으며, 진행 중인 `send`만 즉시 실패합니다 (큐잉 없음).

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::{ClientConfig, Envelope, RelayError, RelayResult};
use serde_json::Value;

use crate::events::{EventBus, HandlerId, MESSAGE_EVENT};

/// 송신 큐 버퍼 크기.
const OUTBOUND_BUFFER: usize = 64;

/// 릴레이 서버에 대한 단일 연결을 유지하는 클라이언트 핸들.
pub struct RelayClient {
    name: String,
    events: EventBus,
    outbound: mpsc::Sender<Envelope>,
    connected: watch::Receiver<bool>,
    shutdown: CancellationToken,
}

impl RelayClient {
    /// 백그라운드 연결 태스크를 시작하고 핸들을 반환합니다.
    ///
    /// 최초 연결 실패도 치명적이지 않습니다. 설정된 지연 간격으로
    /// 연결될 때까지 재시도합니다.
    pub fn connect(config: ClientConfig) -> Self {
        let events = EventBus::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (connected_tx, connected_rx) = watch::channel(false);
        let shutdown = CancellationToken::new();

        tokio::spawn(run_client(
            config.clone(),
            events.clone(),
            outbound_rx,
            connected_tx,
            shutdown.clone(),
        ));

        Self {
            name: config.name,
            events,
            outbound: outbound_tx,
            connected: connected_rx,
            shutdown,
        }
    }

    /// 등록에 사용한 논리적 이름.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// envelope을 지정한 수신자에게 전송합니다.
    ///
    /// 연결되어 있지 않으면 `NotConnected`로 즉시 실패하며 큐잉하지
    /// 않습니다.
    pub async fn send(
        &self,
        receiver: impl Into<String>,
        kind: impl Into<String>,
        data: Value,
    ) -> RelayResult<()> {
        if !*self.connected.borrow() {
            return Err(RelayError::NotConnected);
        }

        let envelope = Envelope::new(self.name.clone(), receiver, kind, data);
        self.outbound
            .send(envelope)
            .await
            .map_err(|_| RelayError::NotConnected)
    }

    /// 이벤트 구독. 이벤트 이름은 envelope의 `type` 태그이거나
    /// 모든 메시지를 받는 `"message"`입니다.
    pub async fn on(
        &self,
        event: &str,
        handler: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> HandlerId {
        self.events.on(event, handler).await
    }

    /// 구독 해제. 등록된 적 없는 핸들러에 대해서는 no-op입니다.
    pub async fn off(&self, event: &str, id: HandlerId) {
        self.events.off(event, id).await
    }

    /// 현재 연결 여부.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// 연결(및 등록 envelope 전송)이 완료될 때까지 대기합니다.
    pub async fn wait_until_connected(&self) {
        let mut connected = self.connected.clone();
        while !*connected.borrow() {
            if connected.changed().await.is_err() {
                return;
            }
        }
    }

    /// 연결을 닫고 재연결을 중단합니다.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// 수신 envelope 팬아웃 버스.
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

/// 연결 하나가 끝난 이유.
enum PumpOutcome {
    /// 연결이 끊어짐, 재연결 필요
    Disconnected,
    /// 클라이언트가 종료됨
    Finished,
}

/// 연결 수명 주기를 관리하는 백그라운드 태스크.
async fn run_client(
    config: ClientConfig,
    events: EventBus,
    mut outbound_rx: mpsc::Receiver<Envelope>,
    connected_tx: watch::Sender<bool>,
    shutdown: CancellationToken,
) {
    loop {
        let connect = connect_async(config.url.as_str());
        tokio::select! {
            result = connect => match result {
                Ok((ws, _)) => {
                    info!("Connected to relay: {}", config.url);
                    let outcome =
                        pump_connection(&config, &events, &mut outbound_rx, &connected_tx, &shutdown, ws)
                            .await;
                    let _ = connected_tx.send(false);

                    match outcome {
                        PumpOutcome::Finished => return,
                        PumpOutcome::Disconnected => warn!(
                            "Disconnected from relay, retrying in {}s",
                            config.reconnect_delay_secs
                        ),
                    }
                }
                Err(e) => warn!(
                    "Connection to {} failed: {}, retrying in {}s",
                    config.url, e, config.reconnect_delay_secs
                ),
            },
            _ = shutdown.cancelled() => return,
        }

        // 끊긴 동안 도착한 송신 요청은 큐잉하지 않고 버림
        loop {
            match outbound_rx.try_recv() {
                Ok(dropped) => {
                    warn!("Dropping send to {:?} while disconnected", dropped.receiver)
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return,
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.reconnect_delay_secs)) => {}
            _ = shutdown.cancelled() => return,
        }
    }
}

/// 살아있는 연결 하나의 프레임을 펌프합니다.
async fn pump_connection(
    config: &ClientConfig,
    events: &EventBus,
    outbound_rx: &mut mpsc::Receiver<Envelope>,
    connected_tx: &watch::Sender<bool>,
    shutdown: &CancellationToken,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> PumpOutcome {
    let (mut write, mut read) = ws.split();

    // 애플리케이션 트래픽보다 먼저 등록 envelope 전송
    let login = Envelope::login(config.name.as_str());
    match login.to_json() {
        Ok(json) => {
            if let Err(e) = write.send(Message::Text(json.into())).await {
                warn!("Failed to send login: {}", e);
                return PumpOutcome::Disconnected;
            }
        }
        Err(e) => {
            warn!("Failed to encode login: {}", e);
            return PumpOutcome::Disconnected;
        }
    }
    info!("Registered as {:?}", config.name);
    let _ = connected_tx.send(true);

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(events, &text).await,
                Some(Ok(Message::Close(_))) => {
                    info!("Relay closed the connection");
                    return PumpOutcome::Disconnected;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return PumpOutcome::Disconnected;
                }
                None => return PumpOutcome::Disconnected,
            },
            envelope = outbound_rx.recv() => match envelope {
                Some(envelope) => {
                    let json = match envelope.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to encode envelope: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(json.into())).await {
                        // 진행 중이던 전송은 실패로 끝나고 재큐잉되지 않음
                        warn!("Send failed: {}", e);
                        return PumpOutcome::Disconnected;
                    }
                }
                None => return PumpOutcome::Finished,
            },
            _ = shutdown.cancelled() => {
                let _ = write.close().await;
                return PumpOutcome::Finished;
            }
        }
    }
}

/// 수신 텍스트 프레임을 디코딩하여 구독자에게 분배합니다.
async fn dispatch(events: &EventBus, text: &str) {
    match Envelope::from_json(text) {
        Ok(envelope) => {
            debug!(
                sender = %envelope.sender,
                kind = %envelope.kind,
                "Envelope received"
            );
            if !envelope.kind.is_empty() && envelope.kind != MESSAGE_EVENT {
                events.emit(&envelope.kind, &envelope).await;
            }
            events.emit(MESSAGE_EVENT, &envelope).await;
        }
        Err(e) => warn!("Dropping malformed envelope: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_send_while_disconnected_fails_fast() {
        let client = RelayClient::connect(ClientConfig {
            // 아무도 리스닝하지 않는 주소
            url: "ws://127.0.0.1:1".to_string(),
            name: "Frontend".to_string(),
            reconnect_delay_secs: 60,
        });

        let result = client.send("Backtester", "get-indicator", json!({})).await;
        assert!(matches!(result, Err(RelayError::NotConnected)));
        assert!(!client.is_connected());

        client.close();
    }

    #[tokio::test]
    async fn test_dispatch_by_kind_and_catch_all() {
        let events = EventBus::new();
        let by_kind = Arc::new(Mutex::new(0));
        let catch_all = Arc::new(Mutex::new(0));

        let by_kind2 = Arc::clone(&by_kind);
        events
            .on("get-indicator", move |_| *by_kind2.lock().unwrap() += 1)
            .await;
        let catch_all2 = Arc::clone(&catch_all);
        events
            .on(MESSAGE_EVENT, move |_| *catch_all2.lock().unwrap() += 1)
            .await;

        let envelope = Envelope::new("A", "B", "get-indicator", json!(null));
        dispatch(&events, &envelope.to_json().unwrap()).await;

        let other = Envelope::new("A", "B", "something-else", json!(null));
        dispatch(&events, &other.to_json().unwrap()).await;

        assert_eq!(*by_kind.lock().unwrap(), 1);
        assert_eq!(*catch_all.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_of_message_kind_fires_once() {
        let events = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count2 = Arc::clone(&count);
        events
            .on(MESSAGE_EVENT, move |_| *count2.lock().unwrap() += 1)
            .await;

        // "message" 태그가 catch-all 구독자를 두 번 부르지 않아야 함
        let envelope = Envelope::new("A", "B", MESSAGE_EVENT, json!(null));
        dispatch(&events, &envelope.to_json().unwrap()).await;

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_malformed_text() {
        let events = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count2 = Arc::clone(&count);
        events
            .on(MESSAGE_EVENT, move |_| *count2.lock().unwrap() += 1)
            .await;

        dispatch(&events, "not json").await;
        assert_eq!(*count.lock().unwrap(), 0);
    }
}
