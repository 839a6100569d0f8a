//! Single-task connection scheduler.
//!
//! The accept loop hands new connections to a [`PoolHandle`]; they wait in a
//! channel until the pool's next tick admits them. From then on only the pool
//! touches them. Each tick sweeps every active connection, polling it for
//! bytes and evicting those that failed or went idle, and keeps sweeping for as
//! long as any connection produced data. Only after an idle pass does the pool
//! sleep for the poll interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::http::connection::{Connection, ConnectionError, Socket};
use crate::http::handler::RequestHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub poll_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&PoolConfig::default())
    }
}

impl From<&PoolConfig> for PoolSettings {
    fn from(cfg: &PoolConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            idle_timeout: cfg.idle_timeout(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("connection pool has stopped")]
pub struct PoolClosed;

/// Sending side of the admission queue. Cheap to clone.
pub struct PoolHandle<S: Socket = TcpStream> {
    sender: UnboundedSender<Connection<S>>,
}

impl<S: Socket> Clone for PoolHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S: Socket> PoolHandle<S> {
    /// Queues a connection for admission at the pool's next tick.
    ///
    /// Fails once the pool has stopped; the connection is dropped, which
    /// closes its socket.
    pub fn add(&self, connection: Connection<S>) -> Result<(), PoolClosed> {
        self.sender.send(connection).map_err(|_| PoolClosed)
    }
}

pub struct ConnectionPool<S: Socket = TcpStream> {
    pending: UnboundedReceiver<Connection<S>>,
    active: Vec<Connection<S>>,
    handler: Arc<dyn RequestHandler>,
    settings: PoolSettings,
    accepting: bool,
}

impl<S: Socket> ConnectionPool<S> {
    pub fn new(settings: PoolSettings, handler: Arc<dyn RequestHandler>) -> (Self, PoolHandle<S>) {
        let (sender, pending) = mpsc::unbounded_channel();
        let pool = Self {
            pending,
            active: Vec::new(),
            handler,
            settings,
            accepting: true,
        };
        (pool, PoolHandle { sender })
    }

    pub fn settings(&self) -> PoolSettings {
        self.settings
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// False once every [`PoolHandle`] has been dropped and the queue drained.
    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Moves every queued connection into the active set.
    pub fn admit_pending(&mut self) -> usize {
        let mut admitted = 0;
        loop {
            match self.pending.try_recv() {
                Ok(conn) => {
                    debug!(peer = %conn.peer(), "Connection admitted");
                    self.active.push(conn);
                    admitted += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.accepting = false;
                    break;
                }
            }
        }
        admitted
    }

    /// Polls every active connection once, evicting failed and stale ones.
    ///
    /// Returns `true` if any connection read bytes during the pass.
    pub fn sweep(&mut self, now: Instant) -> bool {
        let handler = &*self.handler;
        let timeout = self.settings.idle_timeout;
        let mut busy = false;

        self.active.retain_mut(|conn| {
            let read = conn.poll(handler);
            if !read && conn.is_stale(now, timeout) {
                conn.time_out(timeout);
            }

            if conn.error().is_some() {
                log_close(conn);
                conn.close();
                return false;
            }
            busy |= read;
            true
        });

        busy
    }

    /// Admits queued connections, then sweeps until a pass reads nothing.
    pub fn tick(&mut self) {
        self.admit_pending();
        while self.sweep(Instant::now()) {}
    }

    /// Ticks forever, sleeping the poll interval after each idle tick.
    ///
    /// Returns once all handles are gone and the last connection is closed.
    pub async fn run(mut self) {
        info!(
            poll_interval = ?self.settings.poll_interval,
            idle_timeout = ?self.settings.idle_timeout,
            "Connection pool started"
        );

        loop {
            self.tick();
            if !self.accepting && self.active.is_empty() {
                break;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }

        info!("Connection pool stopped");
    }
}

fn log_close<S: Socket>(conn: &Connection<S>) {
    let Some(error) = conn.error() else {
        return;
    };
    match error {
        ConnectionError::Disconnected => {
            debug!(peer = %conn.peer(), "Client disconnected");
        }
        ConnectionError::Timeout(_) => {
            debug!(peer = %conn.peer(), error = %error, "Evicting idle connection");
        }
        ConnectionError::Socket(_) => {
            warn!(peer = %conn.peer(), error = %error, "Closing connection after socket error");
        }
        _ => {
            debug!(peer = %conn.peer(), error = %error, "Closing connection");
        }
    }
}
