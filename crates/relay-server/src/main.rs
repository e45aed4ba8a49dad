//! 차트 릴레이 서버 바이너리.
//!
//! 설정된 호스트/포트에서 WebSocket 연결을 수락하고 이름이 지정된
//! 엔드포인트 사이에서 envelope을 중계합니다.

use tracing::{info, warn};

use relay_core::{init_logging_from_env, RelayConfig};
use relay_server::RelayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    if let Err(e) = init_logging_from_env() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let config = match RelayConfig::load_default() {
        Ok(config) => config,
        Err(e) => {
            warn!("Could not load config file, using defaults: {}", e);
            RelayConfig::default()
        }
    };

    let server = RelayServer::new(config);
    let shutdown = server.shutdown_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    server.run().await?;

    Ok(())
}
