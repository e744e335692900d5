//! Standalone session server.
//!
//! Usage: `udp-session-server [config.toml]`. Without a path the
//! configuration comes from `UDP_SESSION_*` environment variables.

use tokio::sync::mpsc;
use tracing::{error, info};

use udp_session::config::NetworkConfig;
use udp_session::service::server::SessionServer;
use udp_session::utils::logging::init_logging;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // Logging may not be up yet
        eprintln!("udp-session-server: {e}");
        error!(error = %e, "Server exited with error");
        std::process::exit(1);
    }
}

async fn run() -> udp_session::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => NetworkConfig::from_file(path)?,
        None => NetworkConfig::from_env()?,
    };
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let mut server = SessionServer::new(config.server);
    let local_addr = server.start().await?;
    info!(%local_addr, app = %config.logging.app_name, "Session server listening");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    server
        .serve(shutdown_rx, |payloads| {
            for payload in payloads {
                info!(
                    session_id = %payload.session_id,
                    from = %payload.from,
                    data = %payload.data,
                    "Payload received"
                );
            }
        })
        .await
}
