use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::connection::Connection;
use crate::http::handler::{LogHandler, RequestHandler};
use crate::server::pool::{ConnectionPool, PoolSettings};

/// Pause after a failed accept, so a full fd table does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, cfg, Arc::new(LogHandler)).await
}

/// Accepts connections forever, feeding them to a freshly spawned pool.
pub async fn serve(
    listener: TcpListener,
    cfg: &Config,
    handler: Arc<dyn RequestHandler>,
) -> anyhow::Result<()> {
    let (pool, handle) = ConnectionPool::new(PoolSettings::from(&cfg.pool), handler);
    tokio::spawn(pool.run());

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        info!("Accepted connection from {}", peer);

        let conn = Connection::new(socket, peer).with_limits(cfg.pool.limits());
        handle.add(conn)?;
    }
}
