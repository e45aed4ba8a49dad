//! 릴레이 서버 accept 루프 및 연결 처리.
//!
//! 연결마다 독립된 태스크가 인바운드 스트림을 읽고, 세션별 writer
//! 태스크가 송신 큐를 소켓으로 비웁니다. 공유 상태는 레지스트리
//! 하나뿐입니다.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_core::{Envelope, RelayConfig, RelayError, RelayResult};

use crate::handler::{LocalHandler, LoggingHandler};
use crate::registry::Registry;
use crate::router::route_envelope;
use crate::session::Session;
use crate::state::ServerState;

/// 세션별 송신 큐 버퍼 크기.
const OUTBOUND_BUFFER: usize = 64;

/// 주소 지정 메시지 릴레이 서버.
pub struct RelayServer {
    state: ServerState,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// 기본 로컬 핸들러로 서버를 생성합니다.
    pub fn new(config: RelayConfig) -> Self {
        Self::with_handler(config, Arc::new(LoggingHandler))
    }

    /// 브로커 수신 envelope 핸들러를 지정하여 서버를 생성합니다.
    pub fn with_handler(config: RelayConfig, handler: Arc<dyn LocalHandler>) -> Self {
        Self {
            state: ServerState::new(config, handler),
            shutdown: CancellationToken::new(),
        }
    }

    /// 종료 토큰. 취소하면 accept 루프가 멈추고 등록된 연결이 닫힙니다.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// 엔드포인트 레지스트리.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.state.registry)
    }

    /// 설정된 주소에 바인딩하고 서비스를 시작합니다.
    pub async fn run(self) -> RelayResult<()> {
        let addr = self.state.config.server.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::Transport(format!("bind {} failed: {}", addr, e)))?;

        info!("Relay listening on {}", addr);
        self.serve(listener).await
    }

    /// 이미 바인딩된 리스너로 서비스를 시작합니다.
    pub async fn serve(self, listener: TcpListener) -> RelayResult<()> {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let state = self.state.clone();
                            let server_shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, state, server_shutdown).await;
                            });
                        }
                        Err(e) => warn!("Accept failed: {}", e),
                    }
                }
                _ = self.shutdown.cancelled() => {
                    // 등록 여부와 무관하게 모든 연결 핸들러가 같은 토큰을 감시함
                    info!("Relay shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// 한 연결의 전체 수명을 처리합니다.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: ServerState,
    server_shutdown: CancellationToken,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed with {}: {}", peer, e);
            return;
        }
    };

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let session = Arc::new(Session::new(out_tx));
    info!("Endpoint connected: {} ({})", session.id(), peer);

    let (mut write, mut read) = ws.split();

    // 세션의 송신 큐를 소켓으로 비우는 writer 태스크.
    // 소켓 쓰기는 전부 이 태스크를 거치므로 세션당 직렬화됩니다.
    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let shutdown = session.shutdown_token();
    let read_loop = async {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match Envelope::from_json(&text) {
                    Ok(envelope) => route_envelope(&state, &session, envelope).await,
                    Err(e) => {
                        // 잘못된 메시지 하나가 연결을 끊어서는 안 됨
                        warn!("Dropping malformed envelope from {}: {}", session.id(), e);
                    }
                },
                Ok(Message::Binary(_)) => warn!("Binary messages not supported"),
                Ok(Message::Close(_)) => {
                    debug!("Close frame received from {}", session.id());
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("WebSocket receive error from {}: {}", session.id(), e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = read_loop => {}
        _ = shutdown.cancelled() => {
            debug!("Session {} force-closed", session.id());
        }
        _ = server_shutdown.cancelled() => {
            debug!("Session {} closed by server shutdown", session.id());
        }
    }

    session.close().await;
    state.registry.remove(&session).await;
    writer.abort();
    info!("Endpoint disconnected: {}", session.describe().await);
}
